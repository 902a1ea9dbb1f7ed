//! Shell completion generation.
//!
//! Generate completion scripts for various shells, including the commands
//! contributed by the current cluster's plugins.

use anyhow::Result;
use clap::{CommandFactory, Parser, ValueEnum};
use clap_complete_nushell::Nushell;
use std::io;

use crate::cli::Cli;
use crate::context::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
    Nushell,
}

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate the completion script for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// The full command, with plugin commands when a cluster is attached.
pub fn command(ctx: &Context) -> clap::Command {
    super::plugin_tree(ctx).augment(Cli::command())
}

pub fn run(args: CompletionsArgs, ctx: &Context) -> Result<()> {
    let mut cmd = command(ctx);
    generate(args.shell, &mut cmd, &mut io::stdout());
    Ok(())
}

fn generate(shell: Shell, cmd: &mut clap::Command, out: &mut dyn io::Write) {
    let name = cmd.get_name().to_string();
    match shell {
        Shell::Bash => clap_complete::generate(clap_complete::Shell::Bash, cmd, name, out),
        Shell::Zsh => clap_complete::generate(clap_complete::Shell::Zsh, cmd, name, out),
        Shell::Fish => clap_complete::generate(clap_complete::Shell::Fish, cmd, name, out),
        Shell::PowerShell => {
            clap_complete::generate(clap_complete::Shell::PowerShell, cmd, name, out)
        }
        Shell::Nushell => clap_complete::generate(Nushell, cmd, name, out),
    }
}
