//! Environment lookup that tests can replace without touching the process env.

use std::collections::HashMap;
use std::sync::Arc;

/// A function resolving an environment variable.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Look variables up in the real process environment.
pub fn process_env() -> EnvLookup {
    Arc::new(|key| std::env::var(key).ok())
}

/// Look variables up in a fixed map.
pub fn env_from_map<K, V, I>(vars: I) -> EnvLookup
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let map: HashMap<String, String> = vars
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    Arc::new(move |key| map.get(key).cloned())
}

/// An environment with nothing set.
pub fn empty_env() -> EnvLookup {
    Arc::new(|_| None)
}

/// Parse a boolean the way the CLI accepts them everywhere
/// (`1`, `t`, `true`, `0`, `f`, `false`, in the usual casings).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_lookup() {
        let env = env_from_map([("DCOS_URL", "https://example.com")]);
        assert_eq!(env("DCOS_URL").as_deref(), Some("https://example.com"));
        assert_eq!(env("DCOS_ACS_TOKEN"), None);
    }

    #[test]
    fn bool_forms() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert_eq!(parse_bool(raw), Some(true), "{raw}");
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert_eq!(parse_bool(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool("tRuE"), None);
    }
}
