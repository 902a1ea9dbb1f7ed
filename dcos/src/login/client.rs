use reqwest::StatusCode;
use reqwest::header::WWW_AUTHENTICATE;
use serde::{Deserialize, Serialize};

use super::{DEFAULT_LOGIN_ENDPOINT, Provider, Providers};
use crate::error::{ApiError, HttpError, LoginError};
use crate::httpclient::{HttpClient, decode_json, error_from_response};

const PROVIDERS_PATH: &str = "/acs/api/v1/auth/providers";

/// A resource every cluster serves that requires authentication.
pub const SNIFF_PATH: &str = "/pkgpanda/active.buildinfo.full.json";

/// Body of a login request. Empty fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

/// Talks to a cluster's IAM endpoints.
#[derive(Debug, Clone)]
pub struct LoginClient {
    http: HttpClient,
}

impl LoginClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Discover the login providers a cluster offers.
    ///
    /// Clusters without the providers endpoint are handled through the
    /// `WWW-Authenticate` challenge of an unauthenticated request.
    pub fn providers(&self) -> Result<Providers, LoginError> {
        let challenge = self.challenge_auth()?;

        let resp = self.http.get(PROVIDERS_PATH)?;
        if resp.status() == StatusCode::OK {
            let mut providers: Providers = decode_json(resp)?;
            // The built-in OIDC provider replaces whatever the cluster
            // advertises under the same ID.
            if challenge == "oauthjwt" {
                providers.insert(Provider::default_oidc_implicit_flow());
            }
            return Ok(providers);
        }

        tracing::info!("falling back to the WWW-Authenticate challenge");
        let provider = match challenge.as_str() {
            "oauthjwt" => Provider::default_oidc_implicit_flow(),
            "acsjwt" => Provider::default_uid_password(),
            other => return Err(LoginError::UnsupportedChallenge(other.to_string())),
        };
        Ok([provider].into_iter().collect())
    }

    /// Send an unauthenticated request and return the auth challenge.
    fn challenge_auth(&self) -> Result<String, LoginError> {
        let resp = self.http.head_with_token(SNIFF_PATH, None)?;
        match resp.status() {
            StatusCode::OK => Err(LoginError::AuthDisabled),
            StatusCode::UNAUTHORIZED => Ok(resp
                .headers()
                .get(WWW_AUTHENTICATE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .trim()
                .to_string()),
            other => Err(LoginError::UnexpectedChallenge(other.as_u16())),
        }
    }

    /// Check an ACS token against the well-known authenticated resource.
    ///
    /// 403 still proves the token is valid, just not for that resource.
    pub fn verify_token(&self, token: &str) -> Result<(), LoginError> {
        let resp = self.http.head_with_token(SNIFF_PATH, Some(token))?;
        match resp.status() {
            StatusCode::OK | StatusCode::FORBIDDEN => Ok(()),
            StatusCode::UNAUTHORIZED => Err(LoginError::InvalidToken),
            other => Err(LoginError::UnexpectedStatus(other.as_u16())),
        }
    }

    /// POST credentials to a login endpoint and return the issued ACS token.
    pub fn login(&self, endpoint: &str, credentials: &Credentials) -> Result<String, LoginError> {
        let endpoint = if endpoint.is_empty() {
            DEFAULT_LOGIN_ENDPOINT
        } else {
            endpoint
        };

        let resp = self.http.post_json(endpoint, credentials)?;
        match resp.status() {
            StatusCode::OK => Ok(decode_json::<LoginResponse>(resp)?.token),
            StatusCode::UNAUTHORIZED => {
                let api = resp.json::<ApiError>().unwrap_or_else(|_| ApiError {
                    description: "couldn't log in".into(),
                    ..Default::default()
                });
                Err(LoginError::Rejected(api))
            }
            _ => match error_from_response(resp) {
                err @ HttpError::Api(_) => Err(LoginError::Http(err)),
                _ => Err(LoginError::Failed),
            },
        }
    }
}
