use std::io::Write;

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

use super::client::{Credentials, LoginClient};
use super::flags::{LoginFlags, ResolvedCredentials};
use super::provider::{ClientMethod, OIDC_AUTH0_PROVIDER_ID, Provider, ProviderType, Providers};
use super::server::LoginServer;
use crate::env::EnvLookup;
use crate::error::LoginError;
use crate::httpclient::HttpClient;
use crate::open::Opener;
use crate::output::Output;
use crate::prompt::{Prompt, select_item};

/// Total attempts allowed when the user is typing credentials.
pub const MAX_ATTEMPTS: u32 = 3;

/// Lifetime of the self-signed token used for service account login.
const SERVICE_TOKEN_TTL_SECS: i64 = 5 * 60;

/// Where a login attempt stands.
///
/// `interactive` flips to true as soon as the user is prompted for anything;
/// only then is a rejected credential worth another try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptContext {
    pub attempt: u32,
    pub interactive: bool,
}

impl AttemptContext {
    pub fn first() -> Self {
        Self {
            attempt: 1,
            interactive: false,
        }
    }

    pub fn should_retry(&self, err: &LoginError) -> bool {
        self.interactive && err.is_recoverable() && self.attempt < MAX_ATTEMPTS
    }

    pub fn next(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

/// Drives provider discovery, provider selection and the login method.
pub struct LoginFlow<'a> {
    prompt: &'a dyn Prompt,
    opener: &'a dyn Opener,
    env: EnvLookup,
    errout: Box<dyn Write + 'a>,
    login_server: Option<LoginServer>,
}

impl<'a> LoginFlow<'a> {
    pub fn new(prompt: &'a dyn Prompt, opener: &'a dyn Opener, env: EnvLookup) -> Self {
        Self {
            prompt,
            opener,
            env,
            errout: Box::new(std::io::stderr()),
            login_server: None,
        }
    }

    /// Send the browser hint somewhere other than stderr.
    pub fn with_errout(mut self, errout: impl Write + 'a) -> Self {
        self.errout = Box::new(errout);
        self
    }

    /// Log into the cluster behind `http` and return an ACS token.
    pub fn start(&mut self, flags: &LoginFlags, http: &HttpClient) -> Result<String, LoginError> {
        let creds = flags.resolve(&self.env)?;
        let client = LoginClient::new(http.clone());
        let providers = client.providers()?;
        let provider = self.select_provider(&creds, &providers)?;
        tracing::debug!(provider = %provider.id, "selected login provider");
        self.trigger_method(&client, &creds, &provider)
    }

    /// Pick a provider explicitly, implicitly or by asking.
    pub fn select_provider(
        &self,
        creds: &ResolvedCredentials,
        providers: &Providers,
    ) -> Result<Provider, LoginError> {
        if let Some(id) = &creds.provider_id {
            return providers
                .get(id)
                .cloned()
                .ok_or_else(|| LoginError::UnknownProvider(id.clone()));
        }

        let mut candidates = Vec::new();
        for provider in providers.iter() {
            // A username/password pair works against uid-password whatever
            // directory backs it, including LDAP.
            if provider.provider_type == ProviderType::UidPassword
                && creds.username.is_some()
                && creds.password.is_some()
            {
                return Ok(provider.clone());
            }

            if creds.supports(provider) {
                candidates.push(provider.clone());
            } else {
                tracing::info!(provider = %provider.id, "excluding provider based on command-line flags");
            }
        }

        match candidates.len() {
            0 => Err(LoginError::NoProvider),
            1 => Ok(candidates.remove(0)),
            _ => select_item(self.prompt, "Please select a login method:", &candidates)
                .cloned()
                .map_err(LoginError::Prompt),
        }
    }

    fn trigger_method(
        &mut self,
        client: &LoginClient,
        creds: &ResolvedCredentials,
        provider: &Provider,
    ) -> Result<String, LoginError> {
        let mut ctx = AttemptContext::first();
        loop {
            let result = match &provider.client_method {
                ClientMethod::Credential | ClientMethod::UserCredential => {
                    self.login_uid_password(client, creds, provider, &mut ctx)
                }
                ClientMethod::ServiceCredential => self.login_service(client, creds, &mut ctx),
                ClientMethod::BrowserAuthToken | ClientMethod::BrowserOidcToken => {
                    if ctx.attempt == 1 {
                        self.init_browser_flow(client, provider);
                    }
                    self.login_browser(client, provider, &mut ctx)
                }
                ClientMethod::Unsupported(method) => {
                    Err(LoginError::UnsupportedMethod(method.clone()))
                }
            };

            match result {
                Ok(token) => return Ok(token),
                Err(err) if ctx.should_retry(&err) => {
                    Output::error(format!("Error: {err}"));
                    ctx = ctx.next();
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn login_uid_password(
        &self,
        client: &LoginClient,
        creds: &ResolvedCredentials,
        provider: &Provider,
        ctx: &mut AttemptContext,
    ) -> Result<String, LoginError> {
        let uid = self.uid(creds, ctx)?;
        let password = match &creds.password {
            Some(password) => password.clone(),
            None => {
                ctx.interactive = true;
                self.prompt
                    .password("Password: ")
                    .map_err(LoginError::Prompt)?
            }
        };
        client.login(
            &provider.config.start_flow_url,
            &Credentials {
                uid,
                password,
                ..Default::default()
            },
        )
    }

    fn login_service(
        &self,
        client: &LoginClient,
        creds: &ResolvedCredentials,
        ctx: &mut AttemptContext,
    ) -> Result<String, LoginError> {
        let key = creds
            .private_key
            .as_ref()
            .ok_or(LoginError::MissingPrivateKey)?;
        let uid = self.uid(creds, ctx)?;
        let token = service_token(&uid, key)?;
        client.login(
            "",
            &Credentials {
                uid,
                token,
                ..Default::default()
            },
        )
    }

    /// Take the token from the login server if one is running, else ask.
    ///
    /// Only a pasted token makes the attempt interactive: a token delivered
    /// by the server can't be a typo.
    fn login_browser(
        &mut self,
        client: &LoginClient,
        provider: &Provider,
        ctx: &mut AttemptContext,
    ) -> Result<String, LoginError> {
        let token = match self.login_server.take() {
            Some(server) => server.token().ok_or(LoginError::NoBrowserToken)?,
            None => {
                let token = self
                    .prompt
                    .input("Enter token from the browser: ")
                    .map_err(LoginError::Prompt)?;
                ctx.interactive = true;
                token
            }
        };

        if provider.client_method == ClientMethod::BrowserOidcToken {
            return client.login(
                "",
                &Credentials {
                    token,
                    ..Default::default()
                },
            );
        }

        client.verify_token(&token)?;
        Ok(token)
    }

    /// Point the user's browser at the provider's start URL, intercepting
    /// the token through a local server for the hosted OIDC provider.
    ///
    /// Failing to launch a browser is not fatal, the link is printed anyway.
    fn init_browser_flow(&mut self, client: &LoginClient, provider: &Provider) {
        let start = &provider.config.start_flow_url;
        let mut url = if start.starts_with('/') {
            client
                .http()
                .url(start)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| start.clone())
        } else {
            start.clone()
        };

        if provider.id == OIDC_AUTH0_PROVIDER_ID {
            match LoginServer::start(&url) {
                Ok(server) => {
                    url = server.start_flow_url().to_string();
                    self.login_server = Some(server);
                }
                Err(err) => tracing::error!("{err}"),
            }
        }

        let _ = write!(
            self.errout,
            "If your browser didn't open, please follow this link:\n\n    {url}\n\n"
        );
        if let Err(err) = self.opener.open(&url) {
            tracing::info!("couldn't open browser: {err:#}");
            // Without a browser nothing reaches the server, so the token is
            // read from the terminal instead.
            self.login_server = None;
        }
    }

    fn uid(&self, creds: &ResolvedCredentials, ctx: &mut AttemptContext) -> Result<String, LoginError> {
        if let Some(username) = &creds.username {
            return Ok(username.clone());
        }
        ctx.interactive = true;
        self.prompt
            .input("Username: ")
            .map_err(LoginError::Prompt)
    }
}

#[derive(Serialize)]
struct ServiceClaims<'a> {
    uid: &'a str,
    exp: i64,
}

/// Sign a short-lived RS256 token asserting `uid`.
pub fn service_token(uid: &str, key: &EncodingKey) -> Result<String, LoginError> {
    let claims = ServiceClaims {
        uid,
        exp: Utc::now().timestamp() + SERVICE_TOKEN_TTL_SECS,
    };
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, key).map_err(LoginError::PrivateKey)
}
