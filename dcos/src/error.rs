//! Error types for the dcos library.
//!
//! Each concern gets its own enum so callers can branch on the conditions
//! that matter (an ambiguous cluster lookup, a plugin that is already
//! installed, a rejected credential) without string matching. Command
//! handlers wrap these in `anyhow::Error` with extra context.

use std::path::PathBuf;

use dcos_common::error::CommonError;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while reading, resolving or persisting cluster configs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no match found")]
    NotFound,

    #[error("multiple matches found")]
    TooManyConfigs,

    #[error("no cluster is attached")]
    NotAttached,

    #[error("multiple clusters are attached")]
    MultipleAttached,

    #[error("no path specified for the config")]
    NoPath,

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("cannot decode the PEM root certificate(s) in {path}")]
    InvalidCa { path: PathBuf },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by plugin discovery, installation and removal.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Another install got there first. Callers installing bundled plugins
    /// treat this as success.
    #[error("'{0}' is already installed")]
    AlreadyInstalled(String),

    #[error("'{0}' is not a plugin directory")]
    NotAPluginDir(String),

    #[error("unknown plugin {0}")]
    Unknown(String),

    #[error("{0} has no commands")]
    NoCommands(String),

    #[error("invalid plugin name '{0}'")]
    InvalidName(String),

    #[error("invalid plugin resource '{0}'")]
    InvalidResource(String),

    #[error("invalid plugin manifest {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize plugin manifest: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structured error body returned by cluster APIs.
///
/// Only the description is shown to users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Error)]
#[error("{description}")]
pub struct ApiError {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub code: String,
}

/// Errors raised by the HTTP transport.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    #[error("couldn't build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("{method} {url} failed: {source}")]
    Request {
        method: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("couldn't decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status code {status} from {url}")]
    Status { status: u16, url: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors raised by the cluster links API.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Clusters predating the links API answer 404 without an API error.
    #[error("inaccessible endpoint, cannot {0}")]
    Inaccessible(&'static str),

    #[error("couldn't {0}")]
    Failed(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Http(#[from] HttpError),
}

/// Errors raised while logging into a cluster.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("authentication disabled")]
    AuthDisabled,

    #[error("couldn't determine a login provider")]
    NoProvider,

    #[error("unknown login provider ID '{0}'")]
    UnknownProvider(String),

    #[error("unsupported WWW-Authenticate challenge '{0}'")]
    UnsupportedChallenge(String),

    #[error("expected status code 401, got {0}")]
    UnexpectedChallenge(u16),

    /// The cluster refused the submitted credentials.
    #[error("{0}")]
    Rejected(ApiError),

    #[error("couldn't log in")]
    Failed,

    #[error("unsupported login client method '{0}'")]
    UnsupportedMethod(String),

    #[error("invalid auth token")]
    InvalidToken,

    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),

    #[error("couldn't read password from '{0}' env var")]
    PasswordEnv(String),

    #[error("couldn't read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid private key: {0}")]
    PrivateKey(#[source] jsonwebtoken::errors::Error),

    #[error("a private key is required to log in as a service account")]
    MissingPrivateKey,

    #[error("couldn't start the login server: {0}")]
    LoginServer(#[source] std::io::Error),

    #[error("the login server stopped before receiving a token")]
    NoBrowserToken,

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("prompt failed: {0}")]
    Prompt(#[source] std::io::Error),
}

impl LoginError {
    /// Whether another attempt with different user input could succeed.
    ///
    /// Transport failures and protocol surprises are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            LoginError::Rejected(_) | LoginError::InvalidToken
        )
    }
}
