//! Plugin discovery, installation and invocation.
//!
//! A plugin is a directory under `<cluster dir>/subcommands` whose `env`
//! folder holds either a `plugin.toml` manifest or, for older packages,
//! `bin/dcos-<command>` executables.

mod manager;
mod manifest;
mod tree;

use std::path::Path;

pub use manager::{InstallOpts, PluginManager};
pub use manifest::{COMMAND_PREFIX, Command, Executable, Flag, MANIFEST_FILE, Plugin, find_commands};
pub use tree::{CommandTree, PluginCommand};

use crate::config::Cluster;

/// Environment handed to a plugin process.
///
/// Plugins read the cluster URL, token and TLS settings from here instead of
/// parsing the CLI's config themselves.
pub fn invocation_env(
    executable: &Path,
    verbosity: u8,
    cluster: Option<&Cluster>,
) -> Vec<(String, String)> {
    let mut env = vec![(
        "DCOS_CLI_EXECUTABLE_PATH".to_string(),
        executable.to_string_lossy().into_owned(),
    )];

    match verbosity {
        0 => {}
        1 => {
            env.push(("DCOS_VERBOSITY".into(), "1".into()));
            env.push(("DCOS_LOG_LEVEL".into(), "info".into()));
        }
        _ => {
            env.push(("DCOS_VERBOSITY".into(), "2".into()));
            env.push(("DCOS_LOG_LEVEL".into(), "debug".into()));
        }
    }

    if let Some(cluster) = cluster {
        let url = cluster.url();
        env.push(("DCOS_URL".into(), url.clone()));
        env.push(("DCOS_ACS_TOKEN".into(), cluster.acs_token()));

        match cluster.tls() {
            Ok(tls) if tls.insecure || url.starts_with("http://") => {
                env.push(("DCOS_TLS_INSECURE".into(), "1".into()));
            }
            Ok(tls) => {
                if let Some(path) = tls.root_ca_path {
                    env.push(("DCOS_TLS_CA_PATH".into(), path.to_string_lossy().into_owned()));
                }
            }
            Err(err) => tracing::debug!("not passing TLS settings to plugin: {err}"),
        }
    }
    env
}
