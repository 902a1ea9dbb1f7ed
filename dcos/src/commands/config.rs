//! `dcos config`: read and write the current cluster's config document.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use crate::config::{ConfigStore, keys, known_keys};
use crate::context::Context;
use crate::error::ConfigError;
use crate::output::Output;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Add or set a property in the configuration file used for the current cluster
    Set { name: String, value: String },
    /// Remove a property from the configuration file used for the current cluster
    Unset { name: String },
    /// Print the configuration file related to the current cluster
    Show { name: Option<String> },
    /// Print all the keys that can be set in a configuration file
    Keys {
        /// Only print config keys
        #[arg(short, long)]
        quiet: bool,
    },
}

pub fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.action {
        ConfigAction::Set { name, value } => {
            let mut config = ctx.cluster()?.into_config();
            config.set(&name, value.as_str())?;
            config.persist()?;
            Output::success(format!("Config value {name} was set to {value}"));
        }
        ConfigAction::Unset { name } => {
            let mut config = ctx.cluster()?.into_config();
            config.unset(&name);
            config.persist()?;
            Output::success(format!("Config value {name} was removed"));
        }
        ConfigAction::Show { name } => {
            for line in show(&current_or_empty(ctx)?, name.as_deref())? {
                println!("{line}");
            }
        }
        ConfigAction::Keys { quiet } => {
            for (key, description) in known_keys() {
                if quiet {
                    println!("{key}");
                } else {
                    println!("{key} : {description}");
                }
            }
        }
    }
    Ok(())
}

/// The current config, or an empty one when no cluster is configured at all
/// so environment overrides can still be shown.
fn current_or_empty(ctx: &Context) -> Result<ConfigStore> {
    let manager = ctx.config_manager();
    match manager.current() {
        Ok(config) => Ok(config),
        Err(ConfigError::NotAttached) if manager.all().is_empty() => Ok(manager.new_config()),
        Err(_) => Ok(ctx.cluster()?.into_config()),
    }
}

/// Lines printed by `config show`. The ACS token is masked when showing the
/// whole document.
fn show(config: &ConfigStore, name: Option<&str>) -> Result<Vec<String>> {
    if let Some(key) = name {
        if config.get(key).is_none() {
            bail!("unknown key \"{key}\"");
        }
        return Ok(vec![config.get_string(key)]);
    }

    Ok(config
        .keys()
        .into_iter()
        .filter(|key| config.get(key).is_some())
        .map(|key| {
            let value = if key == keys::ACS_TOKEN {
                "********".to_string()
            } else {
                config.get_string(&key)
            };
            format!("{key} {value}")
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{context, context_with_env, save_cluster};
    use crate::testing::ScriptedPrompt;
    use tempfile::TempDir;

    #[test]
    fn show_masks_the_token() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), ScriptedPrompt::default());
        let mut cluster = save_cluster(&ctx, "abc", "https://abc.example.com");
        cluster.set_acs_token("secret").unwrap();
        cluster.config_mut().set(keys::TIMEOUT, "30").unwrap();

        let lines = show(cluster.config(), None).unwrap();
        assert_eq!(
            lines,
            vec![
                "cluster.name abc".to_string(),
                "core.dcos_acs_token ********".to_string(),
                "core.dcos_url https://abc.example.com".to_string(),
                "core.timeout 30".to_string(),
            ]
        );
        assert_eq!(show(cluster.config(), Some(keys::ACS_TOKEN)).unwrap(), vec!["secret"]);
    }

    #[test]
    fn show_unknown_key() {
        let config = ConfigStore::default();
        let err = show(&config, Some("core.nope")).unwrap_err();
        assert_eq!(err.to_string(), "unknown key \"core.nope\"");
    }

    #[test]
    fn show_env_override_without_clusters() {
        let dir = TempDir::new().unwrap();
        let ctx = context_with_env(dir.path(), [("DCOS_URL", "https://dcos.example.org")]);
        let config = current_or_empty(&ctx).unwrap();
        assert_eq!(show(&config, Some(keys::URL)).unwrap(), vec!["https://dcos.example.org"]);
    }

    #[test]
    fn set_and_unset_persist() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), ScriptedPrompt::default());
        save_cluster(&ctx, "abc", "https://abc.example.com");

        let set = ConfigArgs {
            action: ConfigAction::Set {
                name: keys::SSH_USER.into(),
                value: "core".into(),
            },
        };
        run(set, &ctx).unwrap();
        assert_eq!(ctx.cluster().unwrap().config().get_string(keys::SSH_USER), "core");

        let unset = ConfigArgs {
            action: ConfigAction::Unset {
                name: keys::SSH_USER.into(),
            },
        };
        run(unset, &ctx).unwrap();
        assert!(ctx.cluster().unwrap().config().get(keys::SSH_USER).is_none());
    }

    #[test]
    fn set_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), ScriptedPrompt::default());
        save_cluster(&ctx, "abc", "https://abc.example.com");
        let set = ConfigArgs {
            action: ConfigAction::Set {
                name: keys::TIMEOUT.into(),
                value: "soon".into(),
            },
        };
        assert!(run(set, &ctx).is_err());
    }
}
