//! Per-invocation state shared by every command.
//!
//! A [`Context`] bundles the environment lookup, the config root directory
//! and the interactive collaborators (command runner, prompt, browser
//! opener). `main` builds one from the real process; tests build one over a
//! temp directory and an environment map.

use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use directories::BaseDirs;

use crate::command_runner::{CommandRunner, RealCommandRunner};
use crate::config::{Cluster, ConfigManager};
use crate::env::{EnvLookup, process_env};
use crate::error::ConfigError;
use crate::httpclient::{HttpClient, HttpOptions};
use crate::open::{Opener, OsOpener};
use crate::plugin::PluginManager;
use crate::prompt::{Prompt, TerminalPrompt};
use crate::setup::Setup;

/// Overrides the config root directory.
pub const DIR_ENV: &str = "DCOS_DIR";

pub struct Context {
    env: EnvLookup,
    dir: PathBuf,
    manager: ConfigManager,
    runner: Arc<dyn CommandRunner>,
    prompt: Rc<dyn Prompt>,
    opener: Rc<dyn Opener>,
    verbosity: u8,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("dir", &self.dir)
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Context over the real process environment and terminal.
    pub fn from_process(verbosity: u8) -> Result<Self> {
        let env = process_env();
        let dir = root_dir(&env)?;
        let runner: Arc<dyn CommandRunner> = Arc::new(RealCommandRunner);
        let opener = Rc::new(OsOpener::new(runner.clone()));
        Ok(Self::new(env, dir, runner, Rc::new(TerminalPrompt), opener).with_verbosity(verbosity))
    }

    pub fn new(
        env: EnvLookup,
        dir: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
        prompt: Rc<dyn Prompt>,
        opener: Rc<dyn Opener>,
    ) -> Self {
        let dir = dir.into();
        Self {
            manager: ConfigManager::new(&dir, env.clone()),
            env,
            dir,
            runner,
            prompt,
            opener,
            verbosity: 0,
        }
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn env(&self) -> &EnvLookup {
        &self.env
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        self.runner.clone()
    }

    pub fn prompt(&self) -> &dyn Prompt {
        self.prompt.as_ref()
    }

    pub fn opener(&self) -> &dyn Opener {
        self.opener.as_ref()
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn config_manager(&self) -> &ConfigManager {
        &self.manager
    }

    /// The cluster commands target by default.
    pub fn cluster(&self) -> Result<Cluster> {
        match self.manager.current() {
            Ok(config) => Ok(Cluster::new(config)),
            Err(ConfigError::NotAttached) => {
                bail!("no cluster is attached. Please run `dcos cluster attach <cluster-name>`")
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Every configured cluster, ordered by ID.
    pub fn clusters(&self) -> Vec<Cluster> {
        self.manager
            .all()
            .into_iter()
            .map(Cluster::new)
            .collect()
    }

    pub fn http_client(&self, cluster: &Cluster) -> Result<HttpClient> {
        let options = HttpOptions::for_cluster(cluster)?;
        HttpClient::new(options).with_context(|| format!("couldn't connect to {}", cluster.url()))
    }

    pub fn plugin_manager(&self, cluster: &Cluster) -> Result<PluginManager> {
        let dir = cluster
            .dir()
            .context("the cluster has no local configuration")?;
        Ok(PluginManager::new(dir, self.runner.clone()))
    }

    pub fn setup(&self) -> Setup<'_> {
        Setup::new(
            self.prompt(),
            self.opener(),
            &self.manager,
            self.runner.clone(),
            self.env.clone(),
        )
    }
}

/// `$DCOS_DIR` made absolute, else `~/.dcos`.
pub fn root_dir(env: &EnvLookup) -> Result<PathBuf> {
    if let Some(dir) = env(DIR_ENV).filter(|d| !d.is_empty()) {
        let dir = PathBuf::from(dir);
        if dir.is_absolute() {
            return Ok(dir);
        }
        let cwd = std::env::current_dir().context("couldn't read the working directory")?;
        return Ok(cwd.join(dir));
    }
    let base = BaseDirs::new().context("couldn't determine the home directory")?;
    Ok(base.home_dir().join(".dcos"))
}
