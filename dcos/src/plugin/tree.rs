//! The plugin command tree.
//!
//! Built fresh for each invocation from the discovered plugins, then used to
//! dispatch external subcommands and to extend `--help` and completion
//! output with plugin commands.

use std::collections::HashSet;
use std::path::PathBuf;

use clap::{Arg, ArgAction};

use super::manifest::{Command, Flag, Plugin};

/// A top-level command and the executable that implements it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCommand {
    pub plugin: String,
    pub executable: PathBuf,
    pub command: Command,
}

#[derive(Debug, Clone, Default)]
pub struct CommandTree {
    commands: Vec<PluginCommand>,
}

impl CommandTree {
    /// Collect top-level commands. When two plugins claim the same name the
    /// first one wins.
    pub fn new(plugins: &[Plugin]) -> Self {
        let mut seen = HashSet::new();
        let mut commands = Vec::new();
        for plugin in plugins {
            for (exe, cmd) in plugin.commands() {
                if !seen.insert(cmd.name.clone()) {
                    tracing::debug!(
                        "'{}' from plugin '{}' is shadowed by another plugin",
                        cmd.name,
                        plugin.name
                    );
                    continue;
                }
                commands.push(PluginCommand {
                    plugin: plugin.name.clone(),
                    executable: exe.path(&plugin.dir),
                    command: cmd.clone(),
                });
            }
        }
        Self { commands }
    }

    pub fn find(&self, name: &str) -> Option<&PluginCommand> {
        self.commands.iter().find(|c| c.command.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluginCommand> {
        self.commands.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Add plugin commands to `root` as subcommands. Commands clashing with an
    /// existing subcommand are left out.
    pub fn augment(&self, mut root: clap::Command) -> clap::Command {
        let existing: HashSet<String> = root
            .get_subcommands()
            .map(|c| c.get_name().to_string())
            .collect();
        for entry in &self.commands {
            if existing.contains(&entry.command.name) {
                continue;
            }
            root = root.subcommand(to_clap(&entry.command));
        }
        root
    }
}

fn to_clap(cmd: &Command) -> clap::Command {
    let mut out = clap::Command::new(cmd.name.clone()).about(cmd.description.clone());

    let mut ids = HashSet::new();
    let mut shorts = HashSet::new();
    for flag in &cmd.flags {
        if flag.name.is_empty() || flag.name == "help" || !ids.insert(flag.name.clone()) {
            continue;
        }
        out = out.arg(to_arg(flag, &mut shorts));
    }

    for sub in &cmd.subcommands {
        out = out.subcommand(to_clap(sub));
    }
    out
}

fn to_arg(flag: &Flag, shorts: &mut HashSet<char>) -> Arg {
    let mut arg = Arg::new(flag.name.clone())
        .long(flag.name.clone())
        .help(flag.description.clone());

    if let Some(short) = flag.shorthand.chars().next() {
        if short != 'h' && shorts.insert(short) {
            arg = arg.short(short);
        }
    }

    if flag.is_switch() {
        arg.action(ArgAction::SetTrue)
    } else {
        arg.action(ArgAction::Set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::manifest::Executable;

    fn plugin(name: &str, dir: &str, commands: &[&str]) -> Plugin {
        Plugin {
            name: name.into(),
            dir: dir.into(),
            executables: vec![Executable {
                filename: "bin/dcos".into(),
                commands: commands
                    .iter()
                    .map(|c| Command {
                        name: c.to_string(),
                        description: format!("{c} commands"),
                        ..Default::default()
                    })
                    .collect(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn first_plugin_wins() {
        let tree = CommandTree::new(&[
            plugin("core", "/core/env", &["marathon", "job"]),
            plugin("other", "/other/env", &["marathon", "kafka"]),
        ]);

        let names: Vec<_> = tree.iter().map(|c| c.command.name.as_str()).collect();
        assert_eq!(names, ["marathon", "job", "kafka"]);
        assert_eq!(tree.find("marathon").unwrap().plugin, "core");
        assert_eq!(
            tree.find("kafka").unwrap().executable,
            PathBuf::from("/other/env/bin/dcos")
        );
        assert!(tree.find("nope").is_none());
    }

    #[test]
    fn augment_skips_builtins() {
        let tree = CommandTree::new(&[plugin("core", "/core/env", &["config", "marathon"])]);
        let root = clap::Command::new("dcos").subcommand(clap::Command::new("config"));

        let root = tree.augment(root);
        let names: Vec<_> = root.get_subcommands().map(|c| c.get_name()).collect();
        assert_eq!(names, ["config", "marathon"]);
    }

    #[test]
    fn flags_and_subcommands_become_clap_args() {
        let cmd = Command {
            name: "marathon".into(),
            description: "Deploy apps".into(),
            flags: vec![
                Flag {
                    name: "json".into(),
                    shorthand: "j".into(),
                    kind: "bool".into(),
                    ..Default::default()
                },
                Flag {
                    name: "help".into(),
                    shorthand: "h".into(),
                    ..Default::default()
                },
                Flag {
                    name: "app-id".into(),
                    shorthand: "h".into(),
                    ..Default::default()
                },
            ],
            subcommands: vec![Command {
                name: "app".into(),
                ..Default::default()
            }],
        };

        let clap_cmd = to_clap(&cmd);
        clap_cmd.clone().debug_assert();
        let args: Vec<_> = clap_cmd
            .get_arguments()
            .map(|a| a.get_id().as_str())
            .filter(|id| *id != "help")
            .collect();
        assert_eq!(args, ["json", "app-id"]);
        assert!(clap_cmd.find_subcommand("app").is_some());

        let matches = clap_cmd
            .try_get_matches_from(["marathon", "-j", "--app-id", "web"])
            .unwrap();
        assert!(matches.get_flag("json"));
        assert_eq!(matches.get_one::<String>("app-id").unwrap(), "web");
    }
}
