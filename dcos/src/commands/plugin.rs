//! `dcos plugin`: manage the plugins of the current cluster.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use crate::context::Context;
use crate::httpclient::HttpOptions;
use crate::output::Output;
use crate::plugin::{InstallOpts, Plugin};
use crate::setup::CORE_PLUGIN;

#[derive(Debug, Args)]
pub struct PluginArgs {
    #[command(subcommand)]
    pub action: PluginAction,
}

#[derive(Debug, Subcommand)]
pub enum PluginAction {
    /// Add a CLI plugin from a local path or an http(s) URL
    Add {
        resource: String,

        /// Replace the plugin if it is already installed
        #[arg(short, long)]
        update: bool,

        /// Name to install the plugin under when the package doesn't set one
        #[arg(long)]
        name: Option<String>,

        /// Expected SHA-256 of the downloaded package
        #[arg(long)]
        checksum: Option<String>,
    },
    /// Remove a CLI plugin
    Remove { name: String },
    /// List CLI plugins
    List {
        /// Print plugins in JSON format
        #[arg(long)]
        json: bool,
    },
}

pub fn run(args: PluginArgs, ctx: &Context) -> Result<()> {
    let cluster = ctx.cluster()?;
    let manager = ctx.plugin_manager(&cluster)?;

    match args.action {
        PluginAction::Add {
            resource,
            update,
            name,
            checksum,
        } => {
            let opts = InstallOpts {
                name,
                update,
                checksum,
                http: Some(HttpOptions::for_cluster(&cluster)?),
            };
            let plugin = manager.install(&resource, &opts)?;
            Output::success(format!(
                "New commands available: {}",
                plugin.command_names().join(", ")
            ));
        }
        PluginAction::Remove { name } => {
            if name == CORE_PLUGIN {
                bail!("the core plugin can't be removed");
            }
            manager.remove(&name)?;
            Output::success(format!("Removed {name}"));
        }
        PluginAction::List { json } => {
            let plugins = manager.plugins();
            if json {
                println!("{}", serde_json::to_string_pretty(&plugins)?);
            } else {
                Output::table(&plugin_rows(&plugins));
            }
        }
    }
    Ok(())
}

fn plugin_rows(plugins: &[Plugin]) -> Vec<Vec<String>> {
    let mut rows = vec![vec!["NAME".to_string(), "COMMANDS".to_string()]];
    for plugin in plugins {
        let mut commands = plugin.command_names();
        commands.sort_unstable();
        rows.push(vec![plugin.name.clone(), commands.join(" ")]);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::{context, save_cluster};
    use crate::testing::ScriptedPrompt;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"
name = "kafka"
description = "Apache Kafka"
version = "2.9.0"

[[executables]]
filename = "bin/dcos-kafka"

[[executables.commands]]
name = "kafka"
description = "Manage Kafka clusters"

[[executables.commands]]
name = "confluent-kafka"
description = "Manage Confluent Kafka clusters"
"#;

    #[test]
    fn add_list_and_remove() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), ScriptedPrompt::default());
        save_cluster(&ctx, "abc", "https://abc.example.com");

        let bin = dir.path().join("dcos-hello");
        fs::write(&bin, "#!/bin/sh\necho hello\n").unwrap();

        let add = PluginArgs {
            action: PluginAction::Add {
                resource: bin.to_string_lossy().into_owned(),
                update: false,
                name: None,
                checksum: None,
            },
        };
        run(add, &ctx).unwrap();

        let cluster = ctx.cluster().unwrap();
        let plugins = ctx.plugin_manager(&cluster).unwrap().plugins();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name, "dcos-hello");

        let remove = PluginArgs {
            action: PluginAction::Remove {
                name: "dcos-hello".into(),
            },
        };
        run(remove, &ctx).unwrap();
        assert!(ctx.plugin_manager(&cluster).unwrap().plugins().is_empty());
    }

    #[test]
    fn core_plugin_cannot_be_removed() {
        let dir = TempDir::new().unwrap();
        let ctx = context(dir.path(), ScriptedPrompt::default());
        save_cluster(&ctx, "abc", "https://abc.example.com");

        let remove = PluginArgs {
            action: PluginAction::Remove {
                name: CORE_PLUGIN.into(),
            },
        };
        let err = run(remove, &ctx).unwrap_err();
        assert_eq!(err.to_string(), "the core plugin can't be removed");
    }

    #[test]
    fn rows_sort_commands() {
        let plugin: Plugin = toml::from_str(MANIFEST).unwrap();
        assert_eq!(
            plugin_rows(&[plugin]),
            vec![
                vec!["NAME".to_string(), "COMMANDS".to_string()],
                vec!["kafka".to_string(), "confluent-kafka kafka".to_string()],
            ]
        );
    }
}
