use anyhow::Result;
use clap::{CommandFactory, FromArgMatches};
use tracing_subscriber::EnvFilter;

use dcos::cli::{self, Cli};
use dcos::commands;
use dcos::context::Context;
use dcos::output::Output;

/// Log level for a `-v` count. `RUST_LOG` takes precedence.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &[String], verbosity: u8) -> Result<i32> {
    let ctx = Context::from_process(verbosity)?;
    let tree = commands::plugin_tree(&ctx);

    // Plugin commands go straight to their executable; clap would reject
    // their flags.
    let rest = args.get(1..).unwrap_or_default();
    if let Some((index, name)) = cli::leading_command(rest) {
        if !cli::is_builtin(name) {
            if let Some(command) = tree.find(name) {
                return commands::invoke(command, &rest[index..], &ctx);
            }
        }
    }

    let matches = tree.augment(Cli::command()).get_matches_from(args);
    let cli = Cli::from_arg_matches(&matches)?;
    tracing::debug!(verbosity = cli.verbose, "parsed command line");
    commands::run(cli.command, &ctx)
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let rest = args.get(1..).unwrap_or_default();

    // Flags after a plugin command belong to the plugin.
    let verbosity = match cli::leading_command(rest) {
        Some((index, name)) if !cli::is_builtin(name) => cli::verbosity(&rest[..index]),
        _ => cli::verbosity(rest),
    };
    init_tracing(verbosity);

    let code = match run(&args, verbosity) {
        Ok(code) => code,
        Err(err) => {
            if verbosity >= 2 {
                Output::error(format!("Error: {err:?}"));
            } else {
                Output::error(format!("Error: {err}"));
            }
            1
        }
    };
    std::process::exit(code);
}
