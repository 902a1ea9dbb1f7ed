//! Authentication against a cluster's IAM service.
//!
//! Login discovers the providers a cluster offers, narrows them down using
//! the credentials given on the command line and runs the selected
//! provider's client method until an ACS token is obtained.

mod client;
mod flags;
mod flow;
mod provider;
mod server;

pub use client::{Credentials, LoginClient, SNIFF_PATH};
pub use flags::{LoginFlags, ResolvedCredentials};
pub use flow::{AttemptContext, LoginFlow, MAX_ATTEMPTS, service_token};
pub use provider::{
    ClientMethod, OIDC_AUTH0_PROVIDER_ID, Provider, ProviderConfig, ProviderType, Providers,
};
pub use server::{LoginData, LoginServer};

/// Login endpoint of clusters that don't advertise one.
pub const DEFAULT_LOGIN_ENDPOINT: &str = "/acs/api/v1/auth/login";
