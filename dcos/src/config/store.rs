use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use super::{ENV_OVERRIDES, keys};
use crate::env::{EnvLookup, empty_env, parse_bool};
use crate::error::ConfigError;

/// Key/value access to a single TOML config document.
///
/// Keys are dot-separated paths into the document (`core.dcos_url`). Reads
/// consult [`ENV_OVERRIDES`] first; writes coerce values per key so the
/// document keeps the same TOML types across reloads.
pub struct ConfigStore {
    doc: Table,
    path: Option<PathBuf>,
    env: EnvLookup,
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.path)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(empty_env())
    }
}

impl ConfigStore {
    /// An empty document with no backing file.
    pub fn new(env: EnvLookup) -> Self {
        Self {
            doc: Table::new(),
            path: None,
            env,
        }
    }

    /// Load the document at `path`, creating an empty file if there is none.
    pub fn load(path: impl AsRef<Path>, env: EnvLookup) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            write_private(path, b"")?;
        }

        let content = fs::read_to_string(path)?;
        let mut store = Self::from_toml(&content, env).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Parse a document held in memory. The store has no path until one is set.
    pub fn from_toml(content: &str, env: EnvLookup) -> Result<Self, ConfigError> {
        let doc: Table = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        Ok(Self {
            doc,
            path: None,
            env,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn env(&self) -> &EnvLookup {
        &self.env
    }

    /// The underlying document, without environment overrides.
    pub fn document(&self) -> &Table {
        &self.doc
    }

    /// Read a scalar value. Subtrees read as `None`.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(raw) = self.env_override(key) {
            return Some(coerce(key, Value::String(raw.clone())).unwrap_or(Value::String(raw)));
        }

        let mut parts = key.split('.').peekable();
        let mut table = &self.doc;
        while let Some(part) = parts.next() {
            let node = table.get(part)?;
            if parts.peek().is_none() {
                return match node {
                    Value::Table(_) => None,
                    Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_table) => {
                        None
                    }
                    value => Some(value.clone()),
                };
            }
            table = node.as_table()?;
        }
        None
    }

    /// Read a value rendered as a plain string, empty if unset.
    pub fn get_string(&self, key: &str) -> String {
        self.get(key).map(|v| display_value(&v)).unwrap_or_default()
    }

    /// Set a key, coercing the value to the type the key expects.
    ///
    /// Setting the cluster URL drops the stored ACS token, which belongs to
    /// the previous URL.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let value = coerce(key, value.into())?;
        if key == keys::URL {
            self.unset(keys::ACS_TOKEN);
        }

        let parts: Vec<&str> = key.split('.').collect();
        let (leaf, sections) = match parts.split_last() {
            Some((leaf, sections)) if !leaf.is_empty() => (*leaf, sections),
            _ => {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: "empty key".into(),
                });
            }
        };

        let mut table = &mut self.doc;
        for section in sections {
            let node = table
                .entry(section.to_string())
                .or_insert_with(|| Value::Table(Table::new()));
            table = match node {
                Value::Table(inner) => inner,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        reason: format!("'{section}' is not a section"),
                    });
                }
            };
        }
        table.insert(leaf.to_string(), value);
        Ok(())
    }

    /// Remove a key and any section it leaves empty. Missing keys are ignored.
    pub fn unset(&mut self, key: &str) {
        if key == keys::URL {
            self.unset(keys::ACS_TOKEN);
        }
        let parts: Vec<&str> = key.split('.').collect();
        remove_path(&mut self.doc, &parts);
    }

    /// All keys that have a value, including environment overrides, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = ENV_OVERRIDES
            .iter()
            .filter(|(_, var)| (self.env)(var).is_some())
            .map(|(key, _)| key.to_string())
            .collect();
        collect_leaves(&self.doc, "", &mut keys);
        keys.sort();
        keys.dedup();
        keys
    }

    /// Write the document back to its path with owner-only permissions.
    pub fn persist(&self) -> Result<(), ConfigError> {
        let path = self.path.as_deref().ok_or(ConfigError::NoPath)?;
        let content = toml::to_string(&self.doc)?;
        write_private(path, content.as_bytes())
    }

    fn env_override(&self, key: &str) -> Option<String> {
        ENV_OVERRIDES
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, var)| (self.env)(var))
    }
}

/// Render a scalar the way users typed it (strings without quotes).
pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce(key: &str, value: Value) -> Result<Value, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue {
        key: key.to_string(),
        reason,
    };

    match key {
        keys::TIMEOUT => match value {
            Value::Integer(i) => Ok(Value::Integer(i)),
            Value::Float(f) => Ok(Value::Integer(f as i64)),
            Value::Boolean(b) => Ok(Value::Integer(i64::from(b))),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| invalid(format!("'{s}' is not an integer"))),
            other => Err(invalid(format!("{other} is not an integer"))),
        },
        keys::PAGINATION | keys::REPORTING | keys::PROMPT_LOGIN => match value {
            Value::Boolean(b) => Ok(Value::Boolean(b)),
            Value::Integer(i) => Ok(Value::Boolean(i != 0)),
            Value::String(s) => parse_bool(&s)
                .map(Value::Boolean)
                .ok_or_else(|| invalid(format!("'{s}' is not a boolean"))),
            other => Err(invalid(format!("{other} is not a boolean"))),
        },
        keys::TLS => {
            let raw = match value {
                Value::Boolean(b) => b.to_string(),
                Value::String(s) => s,
                other => return Err(invalid(format!("{other} is not a boolean or a path"))),
            };
            if parse_bool(&raw).is_some() || Path::new(&raw).exists() {
                Ok(Value::String(raw))
            } else {
                Err(invalid(format!(
                    "'{raw}' is neither a boolean nor an existing file"
                )))
            }
        }
        _ => match value {
            Value::String(s) => Ok(Value::String(s)),
            Value::Integer(i) => Ok(Value::String(i.to_string())),
            Value::Float(f) => Ok(Value::String(f.to_string())),
            Value::Boolean(b) => Ok(Value::String(b.to_string())),
            Value::Datetime(d) => Ok(Value::String(d.to_string())),
            _ => Err(invalid("expected a scalar value".into())),
        },
    }
}

/// Returns true if something was removed.
fn remove_path(table: &mut Table, parts: &[&str]) -> bool {
    match parts {
        [] => false,
        [leaf] => table.remove(*leaf).is_some(),
        [section, rest @ ..] => {
            let Some(Value::Table(inner)) = table.get_mut(*section) else {
                return false;
            };
            let removed = remove_path(inner, rest);
            if removed && inner.is_empty() {
                table.remove(*section);
            }
            removed
        }
    }
}

fn collect_leaves(table: &Table, prefix: &str, keys: &mut Vec<String>) {
    for (name, value) in table {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match value {
            Value::Table(inner) => collect_leaves(inner, &path, keys),
            _ => keys.push(path),
        }
    }
}

/// Atomic write through a sibling temp file, which is created with mode 0600.
fn write_private(path: &Path, content: &[u8]) -> Result<(), ConfigError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|err| ConfigError::Io(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::env_from_map;

    fn store(content: &str) -> ConfigStore {
        ConfigStore::from_toml(content, empty_env()).unwrap()
    }

    #[test]
    fn get_reads_dotted_keys() {
        let conf = store("[core]\ndcos_url = \"https://example.com\"\ntimeout = 15\n");
        assert_eq!(conf.get_string(keys::URL), "https://example.com");
        assert_eq!(conf.get(keys::TIMEOUT), Some(Value::Integer(15)));
        assert_eq!(conf.get("core.missing"), None);
        assert_eq!(conf.get("core"), None, "subtrees are not values");
    }

    #[test]
    fn env_override_wins() {
        let env = env_from_map([("DCOS_URL", "https://env.example.com"), ("DCOS_TIMEOUT", "20")]);
        let conf =
            ConfigStore::from_toml("[core]\ndcos_url = \"https://doc.example.com\"\n", env).unwrap();
        assert_eq!(conf.get_string(keys::URL), "https://env.example.com");
        assert_eq!(conf.get(keys::TIMEOUT), Some(Value::Integer(20)));
    }

    #[test]
    fn env_override_only_applies_to_whitelisted_keys() {
        let env = env_from_map([("DCOS_SSH_USER", "root")]);
        let conf = ConfigStore::from_toml("[core]\nssh_user = \"core\"\n", env).unwrap();
        assert_eq!(conf.get_string(keys::SSH_USER), "core");
    }

    #[test]
    fn set_coerces_per_key() {
        let mut conf = ConfigStore::default();
        conf.set(keys::TIMEOUT, "30").unwrap();
        conf.set(keys::PAGINATION, "0").unwrap();
        conf.set(keys::REPORTING, true).unwrap();
        conf.set(keys::PROMPT_LOGIN, "True").unwrap();
        conf.set(keys::SSH_USER, 42).unwrap();
        conf.set(keys::TLS, "false").unwrap();

        assert_eq!(conf.get(keys::TIMEOUT), Some(Value::Integer(30)));
        assert_eq!(conf.get(keys::PAGINATION), Some(Value::Boolean(false)));
        assert_eq!(conf.get(keys::REPORTING), Some(Value::Boolean(true)));
        assert_eq!(conf.get(keys::PROMPT_LOGIN), Some(Value::Boolean(true)));
        assert_eq!(conf.get(keys::SSH_USER), Some(Value::String("42".into())));
        assert_eq!(conf.get(keys::TLS), Some(Value::String("false".into())));
    }

    #[test]
    fn set_rejects_bad_values() {
        let mut conf = ConfigStore::default();
        assert!(conf.set(keys::TIMEOUT, "soon").is_err());
        assert!(conf.set(keys::PAGINATION, "maybe").is_err());
        assert!(conf.set(keys::TLS, "/definitely/not/a/ca.crt").is_err());
        assert!(conf.keys().is_empty());
    }

    #[test]
    fn tls_accepts_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("ca.crt");
        fs::write(&ca, "").unwrap();
        let mut conf = ConfigStore::default();
        conf.set(keys::TLS, ca.to_string_lossy().as_ref()).unwrap();
        assert_eq!(conf.get_string(keys::TLS), ca.to_string_lossy());
    }

    #[test]
    fn setting_url_drops_token() {
        let mut conf = store("[core]\ndcos_acs_token = \"abc\"\n");
        conf.set(keys::URL, "https://example.com").unwrap();
        assert_eq!(conf.get(keys::ACS_TOKEN), None);
    }

    #[test]
    fn unset_prunes_empty_sections() {
        let mut conf = store("[core]\ndcos_url = \"https://example.com\"\n[cluster]\nname = \"prod\"\n");
        conf.unset(keys::CLUSTER_NAME);
        assert!(!conf.document().contains_key("cluster"));

        conf.unset("does.not.exist");
        conf.unset(keys::URL);
        assert!(conf.document().is_empty());
    }

    #[test]
    fn unset_url_drops_token() {
        let mut conf =
            store("[core]\ndcos_url = \"https://example.com\"\ndcos_acs_token = \"abc\"\nssh_user = \"core\"\n");
        conf.unset(keys::URL);
        assert_eq!(conf.keys(), vec![keys::SSH_USER.to_string()]);
    }

    #[test]
    fn keys_are_sorted_and_deduplicated() {
        let env = env_from_map([("DCOS_URL", "https://env.example.com")]);
        let conf = ConfigStore::from_toml(
            "[marathon]\nurl = \"x\"\n[core]\ndcos_url = \"y\"\nssh_user = \"core\"\n",
            env,
        )
        .unwrap();
        assert_eq!(
            conf.keys(),
            vec!["core.dcos_url", "core.ssh_user", "marathon.url"]
        );
    }

    #[test]
    fn persist_without_path_fails() {
        let conf = ConfigStore::default();
        assert!(matches!(conf.persist(), Err(ConfigError::NoPath)));
    }

    #[test]
    fn load_creates_missing_file_and_persist_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clusters/abc/dcos.toml");

        let mut conf = ConfigStore::load(&path, empty_env()).unwrap();
        assert!(path.exists());
        conf.set(keys::URL, "https://example.com").unwrap();
        conf.set(keys::PAGINATION, "1").unwrap();
        conf.persist().unwrap();

        let reloaded = ConfigStore::load(&path, empty_env()).unwrap();
        assert_eq!(reloaded.get_string(keys::URL), "https://example.com");
        assert_eq!(reloaded.get(keys::PAGINATION), Some(Value::Boolean(true)));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dcos.toml");
        fs::write(&path, "[core\n").unwrap();
        let err = ConfigStore::load(&path, empty_env()).unwrap_err();
        assert!(err.to_string().contains("dcos.toml"));
    }
}
