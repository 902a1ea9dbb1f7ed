//! CLI argument definitions for dcos.
//!
//! This module contains the clap-derived `Cli` and `Commands` types, plus the
//! small pre-parse scan `main` uses to route plugin commands before clap
//! sees them.

use clap::{ArgAction, CommandFactory, Parser, Subcommand};

use crate::commands;

#[derive(Debug, Parser)]
#[command(name = "dcos")]
#[command(about = "Command line utility for DC/OS")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authenticate to DC/OS clusters
    Auth(commands::auth::AuthArgs),

    /// Manage your DC/OS clusters
    Cluster(commands::cluster::ClusterArgs),

    /// Manage the DC/OS configuration file
    Config(commands::config::ConfigArgs),

    /// Manage CLI plugins
    Plugin(commands::plugin::PluginArgs),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),

    /// A command that no installed plugin provides
    #[command(external_subcommand)]
    External(Vec<String>),
}

fn is_verbose_flag(arg: &str) -> bool {
    arg == "--verbose" || (arg.len() > 1 && arg.starts_with('-') && arg[1..].chars().all(|c| c == 'v'))
}

fn verbose_count(arg: &str) -> u8 {
    if arg == "--verbose" {
        1
    } else {
        u8::try_from(arg.len() - 1).unwrap_or(u8::MAX)
    }
}

/// Index and name of the first positional argument in `args` (program name
/// excluded), as long as only flags precede it.
pub fn leading_command(args: &[String]) -> Option<(usize, &str)> {
    args.iter()
        .enumerate()
        .find(|(_, arg)| !arg.starts_with('-'))
        .map(|(index, arg)| (index, arg.as_str()))
}

/// Count `-v` flags up to `--`.
pub fn verbosity(args: &[String]) -> u8 {
    args.iter()
        .take_while(|arg| *arg != "--")
        .filter(|arg| is_verbose_flag(arg))
        .fold(0u8, |total, arg| total.saturating_add(verbose_count(arg)))
}

/// Whether `name` is one of the built-in commands (or `help`).
pub fn is_builtin(name: &str) -> bool {
    name == "help" || Cli::command().find_subcommand(name).is_some()
}
