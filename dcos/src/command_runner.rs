//! Launching external programs.
//!
//! The CLI execs plugin binaries (to forward a command, or to ask one for its
//! `--info` summary) and the platform's URL opener. Both go through
//! [`CommandRunner`] so tests can script the child processes.

use std::process::{Command, ExitStatus, Output, Stdio};

use anyhow::{Context, Result};

pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion with stdin closed, capturing its output.
    fn capture(&self, program: &str, args: &[&str]) -> Result<Output>;

    /// Run `program` on the caller's terminal, adding `env` to the inherited
    /// environment.
    fn exec(&self, program: &str, args: &[&str], env: &[(String, String)]) -> Result<ExitStatus>;
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealCommandRunner;

impl CommandRunner for RealCommandRunner {
    fn capture(&self, program: &str, args: &[&str]) -> Result<Output> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("couldn't run '{program}'"))
    }

    fn exec(&self, program: &str, args: &[&str], env: &[(String, String)]) -> Result<ExitStatus> {
        Command::new(program)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .status()
            .with_context(|| format!("couldn't run '{program}'"))
    }
}

/// The code to exit with after a child finished. A child killed by a signal
/// has no code and counts as a plain failure.
pub fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
