use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use toml::Value;

use super::{ConfigStore, keys};
use crate::env::parse_bool;
use crate::error::ConfigError;
use crate::tls::decode_pem_certificates;

/// Request timeout used when `core.timeout` is unset or invalid.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// TLS trust settings for talking to a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tls {
    /// Skip certificate verification entirely.
    pub insecure: bool,
    /// PEM bundle trusted instead of the system roots.
    pub root_ca_pem: Option<Vec<u8>>,
    /// Where the bundle was read from.
    pub root_ca_path: Option<PathBuf>,
}

impl Tls {
    pub fn insecure() -> Self {
        Self {
            insecure: true,
            ..Default::default()
        }
    }

    /// The `core.ssl_verify` representation of these settings.
    pub fn to_config_value(&self) -> String {
        if self.insecure {
            "false".into()
        } else if let Some(path) = &self.root_ca_path {
            path.to_string_lossy().into_owned()
        } else {
            "true".into()
        }
    }
}

/// A typed view over one cluster's config document.
#[derive(Debug)]
pub struct Cluster {
    config: ConfigStore,
    id: Option<String>,
}

impl Cluster {
    pub fn new(config: ConfigStore) -> Self {
        Self { config, id: None }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigStore {
        &mut self.config
    }

    pub fn into_config(self) -> ConfigStore {
        self.config
    }

    /// Cluster URL without a trailing slash.
    pub fn url(&self) -> String {
        self.config
            .get_string(keys::URL)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn set_url(&mut self, url: &str) -> Result<(), ConfigError> {
        self.config.set(keys::URL, url)
    }

    pub fn acs_token(&self) -> String {
        self.config.get_string(keys::ACS_TOKEN)
    }

    pub fn set_acs_token(&mut self, token: &str) -> Result<(), ConfigError> {
        if token.is_empty() {
            self.config.unset(keys::ACS_TOKEN);
            Ok(())
        } else {
            self.config.set(keys::ACS_TOKEN, token)
        }
    }

    /// Interpret `core.ssl_verify`: unset or true means system trust, false
    /// disables verification, anything else names a CA bundle on disk.
    pub fn tls(&self) -> Result<Tls, ConfigError> {
        let raw = self.config.get_string(keys::TLS);
        if raw.is_empty() {
            return Ok(Tls::default());
        }
        if let Some(verify) = parse_bool(&raw) {
            return Ok(Tls {
                insecure: !verify,
                ..Default::default()
            });
        }

        let path = PathBuf::from(&raw);
        let invalid = || ConfigError::InvalidCa { path: path.clone() };
        let pem = fs::read(&path).map_err(|_| invalid())?;
        if decode_pem_certificates(&pem).is_empty() {
            return Err(invalid());
        }
        Ok(Tls {
            insecure: false,
            root_ca_pem: Some(pem),
            root_ca_path: Some(path),
        })
    }

    pub fn set_tls(&mut self, tls: &Tls) -> Result<(), ConfigError> {
        self.config.set(keys::TLS, tls.to_config_value())
    }

    pub fn timeout(&self) -> Duration {
        match self.config.get(keys::TIMEOUT) {
            Some(Value::Integer(secs)) if secs > 0 => Duration::from_secs(secs as u64),
            _ => DEFAULT_TIMEOUT,
        }
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), ConfigError> {
        self.config.set(keys::TIMEOUT, timeout.as_secs() as i64)
    }

    /// Display name, falling back to the ID.
    pub fn name(&self) -> String {
        let name = self.config.get_string(keys::CLUSTER_NAME);
        if name.is_empty() { self.id() } else { name }
    }

    pub fn set_name(&mut self, name: &str) -> Result<(), ConfigError> {
        self.config.set(keys::CLUSTER_NAME, name)
    }

    /// The cluster ID, which is the name of the directory holding its config.
    ///
    /// Clusters that only exist as remote links carry an explicit ID instead.
    pub fn id(&self) -> String {
        if let Some(id) = &self.id {
            return id.clone();
        }
        self.dir()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Directory holding the config document.
    pub fn dir(&self) -> Option<&Path> {
        self.config.path().and_then(Path::parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::empty_env;

    fn cluster(content: &str) -> Cluster {
        Cluster::new(ConfigStore::from_toml(content, empty_env()).unwrap())
    }

    #[test]
    fn accessors_read_the_document() {
        let c = cluster(
            "[core]\ndcos_url = \"https://example.com/\"\ndcos_acs_token = \"tok\"\ntimeout = 15\n[cluster]\nname = \"prod\"\n",
        );
        assert_eq!(c.url(), "https://example.com");
        assert_eq!(c.acs_token(), "tok");
        assert_eq!(c.timeout(), Duration::from_secs(15));
        assert_eq!(c.name(), "prod");
    }

    #[test]
    fn defaults() {
        let c = cluster("");
        assert_eq!(c.timeout(), DEFAULT_TIMEOUT);
        assert_eq!(c.tls().unwrap(), Tls::default());
        assert_eq!(c.id(), "");
    }

    #[test]
    fn id_is_directory_name_and_name_falls_back_to_it() {
        let mut store = ConfigStore::default();
        store.set_path("/home/user/.dcos/clusters/79f2/dcos.toml");
        let c = Cluster::new(store);
        assert_eq!(c.id(), "79f2");
        assert_eq!(c.name(), "79f2");
    }

    #[test]
    fn tls_from_booleans() {
        assert!(cluster("[core]\nssl_verify = \"false\"\n").tls().unwrap().insecure);
        assert!(!cluster("[core]\nssl_verify = \"true\"\n").tls().unwrap().insecure);
    }

    #[test]
    fn tls_from_ca_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("dcos_ca.crt");
        fs::write(&ca, include_bytes!("../../tests/fixtures/ca.crt")).unwrap();

        let mut c = cluster("");
        c.config_mut()
            .set(keys::TLS, ca.to_string_lossy().as_ref())
            .unwrap();
        let tls = c.tls().unwrap();
        assert!(!tls.insecure);
        assert_eq!(tls.root_ca_path.as_deref(), Some(ca.as_path()));
        assert!(tls.root_ca_pem.is_some());
    }

    #[test]
    fn tls_with_undecodable_bundle_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("dcos_ca.crt");
        fs::write(&ca, "garbage").unwrap();

        let c = cluster(&format!("[core]\nssl_verify = {:?}\n", ca.to_string_lossy()));
        assert!(matches!(c.tls(), Err(ConfigError::InvalidCa { .. })));
    }

    #[test]
    fn tls_round_trips_through_config_value() {
        let mut c = cluster("");
        c.set_tls(&Tls::insecure()).unwrap();
        assert_eq!(c.config().get_string(keys::TLS), "false");
        c.set_tls(&Tls::default()).unwrap();
        assert_eq!(c.config().get_string(keys::TLS), "true");
    }
}
