//! Blocking HTTP client bound to a cluster.
//!
//! Wraps `reqwest` with the things every cluster call needs: a base URL
//! that relative paths resolve against, the `Authorization: token=...`
//! header, per-cluster TLS trust and a request timeout.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::{Cluster, Tls};
use crate::error::{ApiError, ConfigError, HttpError};

/// How to build an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub base_url: String,
    pub acs_token: Option<String>,
    pub tls: Tls,
    /// `None` disables the timeout.
    pub timeout: Option<Duration>,
    pub follow_redirects: bool,
}

impl HttpOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            acs_token: None,
            tls: Tls::default(),
            timeout: Some(crate::config::DEFAULT_TIMEOUT),
            follow_redirects: true,
        }
    }

    /// Options derived from a cluster's URL, token, TLS and timeout settings.
    pub fn for_cluster(cluster: &Cluster) -> Result<Self, ConfigError> {
        let token = cluster.acs_token();
        Ok(Self {
            base_url: cluster.url(),
            acs_token: (!token.is_empty()).then_some(token),
            tls: cluster.tls()?,
            timeout: Some(cluster.timeout()),
            follow_redirects: true,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.acs_token = (!token.is_empty()).then_some(token);
        self
    }

    pub fn with_tls(mut self, tls: Tls) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn without_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: Url,
    acs_token: Option<String>,
}

impl HttpClient {
    pub fn new(options: HttpOptions) -> Result<Self, HttpError> {
        let base_url = Url::parse(&options.base_url)
            .map_err(|_| HttpError::InvalidUrl(options.base_url.clone()))?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .user_agent(concat!("dcos-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout);
        if !options.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }
        if options.tls.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        } else if let Some(pem) = &options.tls.root_ca_pem {
            builder = builder.tls_built_in_root_certs(false);
            for cert in reqwest::Certificate::from_pem_bundle(pem).map_err(HttpError::Build)? {
                builder = builder.add_root_certificate(cert);
            }
        }

        Ok(Self {
            client: builder.build().map_err(HttpError::Build)?,
            base_url,
            acs_token: options.acs_token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a path against the base URL. Absolute URLs pass through.
    pub fn url(&self, path: &str) -> Result<Url, HttpError> {
        if let Ok(url) = Url::parse(path) {
            if url.has_host() {
                return Ok(url);
            }
        }
        self.base_url
            .join(path)
            .map_err(|_| HttpError::InvalidUrl(path.to_string()))
    }

    pub fn get(&self, path: &str) -> Result<Response, HttpError> {
        self.send(Method::GET, path, self.acs_token.as_deref(), |req| req)
    }

    pub fn head(&self, path: &str) -> Result<Response, HttpError> {
        self.send(Method::HEAD, path, self.acs_token.as_deref(), |req| req)
    }

    pub fn delete(&self, path: &str) -> Result<Response, HttpError> {
        self.send(Method::DELETE, path, self.acs_token.as_deref(), |req| req)
    }

    pub fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, HttpError> {
        self.send(Method::POST, path, self.acs_token.as_deref(), |req| {
            req.json(body)
        })
    }

    /// HEAD with an explicit token, or with no `Authorization` header at all.
    pub fn head_with_token(&self, path: &str, token: Option<&str>) -> Result<Response, HttpError> {
        self.send(Method::HEAD, path, token, |req| req)
    }

    /// GET a JSON document, treating any non-200 status as an error.
    pub fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        let resp = self.get(path)?;
        if resp.status() != StatusCode::OK {
            return Err(error_from_response(resp));
        }
        decode_json(resp)
    }

    fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        customize: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, HttpError> {
        let url = self.url(path)?;
        tracing::debug!(%method, %url, "sending request");

        let mut req = self.client.request(method.clone(), url.clone());
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, format!("token={token}"));
        }
        let resp = customize(req)
            .send()
            .map_err(|source| HttpError::Request {
                method: method.to_string(),
                url: url.to_string(),
                source,
            })?;
        tracing::debug!(status = resp.status().as_u16(), %url, "received response");
        Ok(resp)
    }
}

pub fn decode_json<T: DeserializeOwned>(resp: Response) -> Result<T, HttpError> {
    let url = resp.url().to_string();
    resp.json().map_err(|source| HttpError::Decode { url, source })
}

/// Turn an unsuccessful response into an error, preferring the structured
/// API error body when the cluster sent one.
pub fn error_from_response(resp: Response) -> HttpError {
    let status = resp.status().as_u16();
    let url = resp.url().to_string();
    match resp.json::<ApiError>() {
        Ok(api) if !api.description.is_empty() => HttpError::Api(api),
        _ => HttpError::Status { status, url },
    }
}

impl HttpError {
    /// See [`crate::tls::is_unknown_authority`].
    pub fn is_unknown_authority(&self) -> bool {
        crate::tls::is_unknown_authority(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Version {
        version: String,
    }

    fn client(server: &mockito::Server, token: Option<&str>) -> HttpClient {
        let mut opts = HttpOptions::new(server.url());
        if let Some(token) = token {
            opts = opts.with_token(token);
        }
        HttpClient::new(opts).unwrap()
    }

    #[test]
    fn sends_token_header() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/dcos-metadata/dcos-version.json")
            .match_header("authorization", "token=abc")
            .with_header("content-type", "application/json")
            .with_body(r#"{"version":"2.1.0"}"#)
            .create();

        let version: Version = client(&server, Some("abc"))
            .get_json("/dcos-metadata/dcos-version.json")
            .unwrap();
        assert_eq!(version.version, "2.1.0");
        mock.assert();
    }

    #[test]
    fn head_without_token_omits_header() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("HEAD", "/pkgpanda/active.buildinfo.full.json")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(401)
            .create();

        let resp = client(&server, Some("abc"))
            .head_with_token("/pkgpanda/active.buildinfo.full.json", None)
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        mock.assert();
    }

    #[test]
    fn api_errors_are_decoded() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/metadata")
            .with_status(403)
            .with_body(r#"{"title":"Forbidden","description":"access denied","code":"ERR_FORBIDDEN"}"#)
            .create();
        server.mock("GET", "/plain").with_status(500).with_body("oops").create();

        let c = client(&server, None);
        let err = c.get_json::<Version>("/metadata").unwrap_err();
        assert_eq!(err.to_string(), "access denied");
        let err = c.get_json::<Version>("/plain").unwrap_err();
        assert!(matches!(err, HttpError::Status { status: 500, .. }));
    }

    #[test]
    fn absolute_urls_pass_through() {
        let server = mockito::Server::new();
        let c = client(&server, None);
        assert_eq!(
            c.url("https://downloads.dcos.io/cli/plugin.zip").unwrap().as_str(),
            "https://downloads.dcos.io/cli/plugin.zip"
        );
        assert_eq!(
            c.url("/acs/api/v1/auth/login").unwrap().as_str(),
            format!("{}/acs/api/v1/auth/login", server.url())
        );
    }

    #[test]
    fn redirects_can_be_disabled() {
        let mut server = mockito::Server::new();
        server
            .mock("HEAD", "/")
            .with_status(302)
            .with_header("location", "https://canonical.example.com/")
            .create();

        let c = HttpClient::new(HttpOptions::new(server.url()).without_redirects()).unwrap();
        let resp = c.head("/").unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
    }

    #[test]
    fn connection_failures_are_transport_errors() {
        let c = HttpClient::new(
            HttpOptions::new("http://127.0.0.1:1").with_timeout(Some(Duration::from_secs(2))),
        )
        .unwrap();
        let err = c.get("/").unwrap_err();
        assert!(matches!(err, HttpError::Request { .. }));
        assert!(!err.is_unknown_authority());
    }

    #[test]
    fn invalid_base_url() {
        let err = HttpClient::new(HttpOptions::new("not a url")).unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl(_)));
    }
}
