//! dcos - command-line client for DC/OS clusters
//!
//! The library behind the `dcos` binary: multi-cluster configuration,
//! cluster setup and login, plugin management and dispatch.
//!
//! # Layout
//!
//! - [`config`]: one TOML document per cluster under `<root>/clusters/<id>/`,
//!   with an `attached` marker selecting the default cluster.
//! - [`setup`] and [`login`]: bootstrap a cluster config and obtain an ACS
//!   token through the providers the cluster advertises.
//! - [`plugin`]: install plugins per cluster and expose their commands as
//!   top-level `dcos` subcommands.
//! - [`cluster`]: list configured and linked clusters, manage links.
//!
//! Commands receive a [`context::Context`] carrying the environment, the
//! root directory and the interactive collaborators, so everything can run
//! against a temp directory in tests.

pub mod cli;
pub mod cluster;
pub mod command_runner;
pub mod commands;
pub mod config;
pub mod context;
pub mod dcos_api;
pub mod env;
pub mod error;
pub mod httpclient;
pub mod login;
pub mod open;
pub mod output;
pub mod plugin;
pub mod prompt;
pub mod setup;
pub mod tls;

#[cfg(test)]
pub(crate) mod testing;

pub use cli::{Cli, Commands};
pub use context::Context;
