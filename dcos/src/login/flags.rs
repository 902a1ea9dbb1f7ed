use std::fmt;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use jsonwebtoken::EncodingKey;

use super::Provider;
use super::provider::ProviderType;
use crate::env::EnvLookup;
use crate::error::LoginError;

/// Command-line flags shared by `auth login` and `cluster setup`.
#[derive(Debug, Clone, Default, Args)]
pub struct LoginFlags {
    /// Specify the authentication provider to use for login
    #[arg(long = "provider")]
    pub provider_id: Option<String>,

    /// Specify the username for login
    #[arg(long)]
    pub username: Option<String>,

    /// Specify the password on the command line (insecure)
    #[arg(long)]
    pub password: Option<String>,

    /// Specify an environment variable name that contains the password
    #[arg(long)]
    pub password_env: Option<String>,

    /// Specify the path to a file that contains the password (insecure)
    #[arg(long)]
    pub password_file: Option<PathBuf>,

    /// Specify the path to a file that contains the service account private key
    #[arg(long)]
    pub private_key: Option<PathBuf>,
}

/// Credentials gathered from flags, files and the environment.
#[derive(Clone, Default)]
pub struct ResolvedCredentials {
    pub provider_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<EncodingKey>,
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("provider_id", &self.provider_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl LoginFlags {
    /// Read password files, password env vars and the private key.
    ///
    /// Precedence for the password is `--password-env`, then
    /// `--password-file`, then `--password`, then `DCOS_PASSWORD`. The
    /// username falls back to `DCOS_USERNAME`.
    pub fn resolve(&self, env: &EnvLookup) -> Result<ResolvedCredentials, LoginError> {
        let mut password = self.password.clone();

        if let Some(path) = &self.password_file {
            let raw = fs::read_to_string(path).map_err(|source| LoginError::ReadFile {
                path: path.clone(),
                source,
            })?;
            password = Some(raw.trim_end().to_string());
        }

        if let Some(var) = &self.password_env {
            password = Some(env(var).ok_or_else(|| LoginError::PasswordEnv(var.clone()))?);
        }

        let password = password
            .or_else(|| env("DCOS_PASSWORD"))
            .filter(|p| !p.is_empty());
        let username = self
            .username
            .clone()
            .or_else(|| env("DCOS_USERNAME"))
            .filter(|u| !u.is_empty());

        let private_key = match &self.private_key {
            Some(path) => {
                let pem = fs::read(path).map_err(|source| LoginError::ReadFile {
                    path: path.clone(),
                    source,
                })?;
                Some(EncodingKey::from_rsa_pem(&pem).map_err(LoginError::PrivateKey)?)
            }
            None => None,
        };

        Ok(ResolvedCredentials {
            provider_id: self.provider_id.clone().filter(|p| !p.is_empty()),
            username,
            password,
            private_key,
        })
    }
}

impl ResolvedCredentials {
    /// Whether `provider` can be used with these credentials.
    ///
    /// Service-key providers need a private key. Browser flows are
    /// exclusive with any non-interactive credential. Everything else works
    /// as long as no private key was given.
    pub fn supports(&self, provider: &Provider) -> bool {
        if provider.provider_type == ProviderType::UidServiceKey {
            return self.private_key.is_some();
        }
        if provider.client_method.is_browser() {
            return self.username.is_none()
                && self.password.is_none()
                && self.private_key.is_none();
        }
        self.private_key.is_none()
    }
}
