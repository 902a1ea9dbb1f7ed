use std::fs;
use std::path::{Path, PathBuf};

use super::{ConfigStore, keys};
use crate::env::EnvLookup;
use crate::error::ConfigError;

pub const CONFIG_FILE: &str = "dcos.toml";
pub const ATTACHED_FILE: &str = "attached";
pub const CA_FILE: &str = "dcos_ca.crt";

/// Discovers and manages the cluster configs under a root directory.
#[derive(Clone)]
pub struct ConfigManager {
    dir: PathBuf,
    env: EnvLookup,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl ConfigManager {
    pub fn new(dir: impl Into<PathBuf>, env: EnvLookup) -> Self {
        Self {
            dir: dir.into(),
            env,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn clusters_dir(&self) -> PathBuf {
        self.dir.join("clusters")
    }

    /// An empty, pathless config sharing this manager's environment.
    pub fn new_config(&self) -> ConfigStore {
        ConfigStore::new(self.env.clone())
    }

    /// Resolve the config commands should target.
    ///
    /// `DCOS_CLUSTER` wins when set (strict lookup). Otherwise a lone
    /// config is current, and with several the attached one is.
    pub fn current(&self) -> Result<ConfigStore, ConfigError> {
        if let Some(name) = (self.env)("DCOS_CLUSTER") {
            return self.find(&name, true);
        }

        let mut configs = self.all();
        if configs.len() == 1 {
            return Ok(configs.remove(0));
        }

        let mut attached = configs.into_iter().filter(|c| self.is_attached(c));
        match (attached.next(), attached.next()) {
            (Some(_), Some(_)) => Err(ConfigError::MultipleAttached),
            (Some(config), None) => Ok(config),
            (None, _) => Err(ConfigError::NotAttached),
        }
    }

    /// Find a config by cluster name or ID.
    ///
    /// An exact ID match returns immediately. With `strict` unset, ID
    /// prefixes match too. Zero or several matches are errors.
    pub fn find(&self, name: &str, strict: bool) -> Result<ConfigStore, ConfigError> {
        let mut matches = Vec::new();
        for config in self.all() {
            let id = config_id(&config);
            if id == name {
                return Ok(config);
            }
            let name_match = config.get_string(keys::CLUSTER_NAME) == name;
            let prefix_match = !strict && !name.is_empty() && id.starts_with(name);
            if name_match || prefix_match {
                matches.push(config);
            }
        }

        match matches.len() {
            0 => Err(ConfigError::NotFound),
            1 => Ok(matches.remove(0)),
            _ => Err(ConfigError::TooManyConfigs),
        }
    }

    /// Every loadable config, ordered by cluster ID.
    ///
    /// A missing clusters directory means no clusters. Unreadable configs
    /// are logged and skipped.
    pub fn all(&self) -> Vec<ConfigStore> {
        let Ok(entries) = fs::read_dir(self.clusters_dir()) else {
            return Vec::new();
        };

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .map(|entry| entry.path())
            .collect();
        dirs.sort();

        dirs.into_iter()
            .filter_map(|dir| {
                let path = dir.join(CONFIG_FILE);
                match ConfigStore::load(&path, self.env.clone()) {
                    Ok(config) => Some(config),
                    Err(err) => {
                        tracing::warn!(path = %path.display(), "skipping cluster config: {err}");
                        None
                    }
                }
            })
            .collect()
    }

    /// Persist `config` as `clusters/<id>/dcos.toml`.
    ///
    /// A CA bundle is written next to it and referenced from `core.ssl_verify`.
    pub fn save(
        &self,
        config: &mut ConfigStore,
        id: &str,
        ca_bundle: Option<&[u8]>,
    ) -> Result<(), ConfigError> {
        let dir = self.clusters_dir().join(id);
        fs::create_dir_all(&dir)?;

        if let Some(bundle) = ca_bundle.filter(|b| !b.is_empty()) {
            let ca_path = dir.join(CA_FILE);
            fs::write(&ca_path, bundle)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&ca_path, fs::Permissions::from_mode(0o644))?;
            }
            config.set(keys::TLS, ca_path.to_string_lossy().as_ref())?;
        }

        config.set_path(dir.join(CONFIG_FILE));
        config.persist()
    }

    /// Make `config` the attached cluster.
    ///
    /// The marker is moved rather than copied so there is never more than
    /// one, and never a moment with none once one exists.
    pub fn attach(&self, config: &ConfigStore) -> Result<(), ConfigError> {
        let target = attached_path(config).ok_or(ConfigError::NoPath)?;
        let current = self
            .all()
            .iter()
            .filter_map(attached_path)
            .find(|path| path.is_file());

        match current {
            Some(existing) if existing == target => Ok(()),
            Some(existing) => Ok(fs::rename(existing, target)?),
            None => {
                fs::File::create(target)?;
                Ok(())
            }
        }
    }

    pub fn is_attached(&self, config: &ConfigStore) -> bool {
        attached_path(config).is_some_and(|path| path.is_file())
    }

    /// Delete a cluster's directory.
    pub fn remove(&self, config: &ConfigStore) -> Result<(), ConfigError> {
        let dir = config
            .path()
            .and_then(Path::parent)
            .ok_or(ConfigError::NoPath)?;
        fs::remove_dir_all(dir)?;
        Ok(())
    }
}

fn config_id(config: &ConfigStore) -> String {
    config
        .path()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn attached_path(config: &ConfigStore) -> Option<PathBuf> {
    Some(config.path()?.parent()?.join(ATTACHED_FILE))
}
