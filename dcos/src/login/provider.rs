use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::prompt::Selectable;

/// ID of the hosted OIDC provider, whose tokens a local server can intercept.
pub const OIDC_AUTH0_PROVIDER_ID: &str = "dcos-oidc-auth0";

/// Authentication scheme a provider implements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderType {
    UidPassword,
    UidServiceKey,
    UidPasswordLdap,
    SamlSpInitiated,
    OidcAuthorizationCodeFlow,
    OidcImplicitFlow,
    Other(String),
}

impl ProviderType {
    pub fn as_str(&self) -> &str {
        match self {
            ProviderType::UidPassword => "dcos-uid-password",
            ProviderType::UidServiceKey => "dcos-uid-servicekey",
            ProviderType::UidPasswordLdap => "dcos-uid-password-ldap",
            ProviderType::SamlSpInitiated => "saml-sp-initiated",
            ProviderType::OidcAuthorizationCodeFlow => "oidc-authorization-code-flow",
            ProviderType::OidcImplicitFlow => "oidc-implicit-flow",
            ProviderType::Other(other) => other,
        }
    }
}

impl From<String> for ProviderType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "dcos-uid-password" => ProviderType::UidPassword,
            "dcos-uid-servicekey" => ProviderType::UidServiceKey,
            "dcos-uid-password-ldap" => ProviderType::UidPasswordLdap,
            "saml-sp-initiated" => ProviderType::SamlSpInitiated,
            "oidc-authorization-code-flow" => ProviderType::OidcAuthorizationCodeFlow,
            "oidc-implicit-flow" => ProviderType::OidcImplicitFlow,
            _ => ProviderType::Other(value),
        }
    }
}

impl From<ProviderType> for String {
    fn from(value: ProviderType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol the CLI follows to turn a provider into an ACS token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClientMethod {
    /// POST uid/password to the start-flow URL.
    Credential,
    /// Same as [`ClientMethod::Credential`], used by newer clusters.
    UserCredential,
    /// POST uid and an RS256 token signed with the service account key.
    ServiceCredential,
    /// The browser shows an ACS token which the user pastes back.
    BrowserAuthToken,
    /// The browser shows an OIDC ID token which is exchanged for an ACS token.
    BrowserOidcToken,
    Unsupported(String),
}

impl ClientMethod {
    pub fn as_str(&self) -> &str {
        match self {
            ClientMethod::Credential => "dcos-credential-post-receive-authtoken",
            ClientMethod::UserCredential => "dcos-usercredential-post-receive-authtoken",
            ClientMethod::ServiceCredential => "dcos-servicecredential-post-receive-authtoken",
            ClientMethod::BrowserAuthToken => "browser-prompt-authtoken",
            ClientMethod::BrowserOidcToken => "browser-prompt-oidcidtoken-get-authtoken",
            ClientMethod::Unsupported(other) => other,
        }
    }

    pub fn is_browser(&self) -> bool {
        matches!(
            self,
            ClientMethod::BrowserAuthToken | ClientMethod::BrowserOidcToken
        )
    }
}

impl From<String> for ClientMethod {
    fn from(value: String) -> Self {
        match value.as_str() {
            "dcos-credential-post-receive-authtoken" => ClientMethod::Credential,
            "dcos-usercredential-post-receive-authtoken" => ClientMethod::UserCredential,
            "dcos-servicecredential-post-receive-authtoken" => ClientMethod::ServiceCredential,
            "browser-prompt-authtoken" => ClientMethod::BrowserAuthToken,
            "browser-prompt-oidcidtoken-get-authtoken" => ClientMethod::BrowserOidcToken,
            _ => ClientMethod::Unsupported(value),
        }
    }
}

impl From<ClientMethod> for String {
    fn from(value: ClientMethod) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub start_flow_url: String,
}

/// A login provider as advertised by `/acs/api/v1/auth/providers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    /// Key of the provider in the discovery document.
    #[serde(default, skip_deserializing)]
    pub id: String,
    #[serde(rename = "authentication-type")]
    pub provider_type: ProviderType,
    #[serde(rename = "client-method")]
    pub client_method: ClientMethod,
    #[serde(default)]
    pub config: ProviderConfig,
    #[serde(default)]
    pub description: String,
}

impl Provider {
    /// Fallback for clusters that only answer the `acsjwt` challenge.
    pub fn default_uid_password() -> Self {
        Self {
            id: "dcos-users".into(),
            provider_type: ProviderType::UidPassword,
            client_method: ClientMethod::UserCredential,
            config: ProviderConfig {
                start_flow_url: super::DEFAULT_LOGIN_ENDPOINT.into(),
            },
            description: "Default DC/OS login provider".into(),
        }
    }

    /// Fallback for open source clusters answering the `oauthjwt` challenge.
    pub fn default_oidc_implicit_flow() -> Self {
        Self {
            id: OIDC_AUTH0_PROVIDER_ID.into(),
            provider_type: ProviderType::OidcImplicitFlow,
            client_method: ClientMethod::BrowserAuthToken,
            config: ProviderConfig {
                start_flow_url: "/login?redirect_uri=urn:ietf:wg:oauth:2.0:oob".into(),
            },
            description: "Google, GitHub, or Microsoft".into(),
        }
    }
}

impl Selectable for Provider {
    fn display_label(&self) -> String {
        match self.provider_type {
            ProviderType::UidPassword => {
                "Log in using a standard DC/OS user account (username and password)".into()
            }
            ProviderType::UidServiceKey => {
                "Log in using a DC/OS service user account (username and private key)".into()
            }
            ProviderType::UidPasswordLdap => {
                "Log in using an LDAP user account (username and password)".into()
            }
            ProviderType::SamlSpInitiated => {
                format!("Log in using SAML 2.0 ({})", self.description)
            }
            ProviderType::OidcImplicitFlow | ProviderType::OidcAuthorizationCodeFlow => {
                format!("Log in using OpenID Connect ({})", self.description)
            }
            ProviderType::Other(_) => format!("Log in using {} ({})", self.id, self.description),
        }
    }
}

/// Providers keyed by ID, iterated in ID order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Providers(BTreeMap<String, Provider>);

impl<'de> Deserialize<'de> for Providers {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, Provider>::deserialize(deserializer)?;
        Ok(Providers(
            raw.into_iter()
                .map(|(id, mut provider)| {
                    provider.id = id.clone();
                    (id, provider)
                })
                .collect(),
        ))
    }
}

impl Providers {
    pub fn insert(&mut self, provider: Provider) {
        self.0.insert(provider.id.clone(), provider);
    }

    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.0.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Provider> for Providers {
    fn from_iter<I: IntoIterator<Item = Provider>>(iter: I) -> Self {
        let mut providers = Providers::default();
        for provider in iter {
            providers.insert(provider);
        }
        providers
    }
}
