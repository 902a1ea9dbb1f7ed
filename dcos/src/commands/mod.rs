//! CLI command implementations.

pub mod auth;
pub mod cluster;
pub mod completions;
pub mod config;
pub mod plugin;

use anyhow::{Result, bail};

use crate::cli::Commands;
use crate::context::Context;
use crate::plugin::{CommandTree, PluginCommand, invocation_env};

/// Run a built-in command. Returns the process exit code.
pub fn run(command: Commands, ctx: &Context) -> Result<i32> {
    match command {
        Commands::Auth(args) => auth::run(args, ctx)?,
        Commands::Cluster(args) => cluster::run(args, ctx)?,
        Commands::Config(args) => config::run(args, ctx)?,
        Commands::Plugin(args) => plugin::run(args, ctx)?,
        Commands::Completions(args) => completions::run(args, ctx)?,
        Commands::External(args) => return run_external(&args, ctx),
    }
    Ok(0)
}

/// Commands contributed by the current cluster's plugins. Empty when no
/// cluster is attached.
pub fn plugin_tree(ctx: &Context) -> CommandTree {
    let plugins = ctx
        .cluster()
        .and_then(|cluster| ctx.plugin_manager(&cluster))
        .map(|manager| manager.plugins());
    match plugins {
        Ok(plugins) => CommandTree::new(&plugins),
        Err(err) => {
            tracing::debug!("not loading plugin commands: {err:#}");
            CommandTree::default()
        }
    }
}

/// Dispatch `args` (command name first) to the plugin providing it.
pub fn run_external(args: &[String], ctx: &Context) -> Result<i32> {
    let Some(name) = args.first() else {
        bail!("missing command");
    };
    let tree = plugin_tree(ctx);
    match tree.find(name) {
        Some(command) => invoke(command, args, ctx),
        None => bail!("unknown command \"{name}\" for \"dcos\""),
    }
}

/// Run a plugin command with the cluster settings in its environment and
/// return its exit code.
pub fn invoke(command: &PluginCommand, args: &[String], ctx: &Context) -> Result<i32> {
    let cluster = ctx.cluster()?;
    let manager = ctx.plugin_manager(&cluster)?;
    tracing::debug!(
        plugin = %command.plugin,
        executable = %command.executable.display(),
        "invoking plugin command"
    );
    let env = invocation_env(&command.executable, ctx.verbosity(), Some(&cluster));
    manager.invoke(&command.executable, args, env)
}
