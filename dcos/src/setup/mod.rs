//! `dcos cluster setup`: bootstrap a new cluster config.
//!
//! Setup settles on the canonical URL, establishes TLS trust (downloading
//! and confirming the cluster CA when the system roots don't cover it), logs
//! in, reads the cluster ID and persists everything under
//! `clusters/<cluster id>`.

mod ca;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use reqwest::header::LOCATION;

pub use ca::{CA_BUNDLE_PATH, describe_ca, download_ca_bundle, trust_bundle};

use crate::command_runner::CommandRunner;
use crate::config::{Cluster, ConfigManager, Tls};
use crate::dcos_api;
use crate::env::{EnvLookup, parse_bool};
use crate::error::{HttpError, LoginError, PluginError};
use crate::httpclient::{HttpClient, HttpOptions};
use crate::login::{LoginFlags, LoginFlow};
use crate::open::Opener;
use crate::output::Output;
use crate::plugin::{InstallOpts, PluginManager};
use crate::prompt::Prompt;

/// Request timeout while setting up, unless `--no-timeout` is given.
pub const SETUP_TIMEOUT: Duration = Duration::from_secs(5);

pub const CORE_PLUGIN: &str = "dcos-core-cli";
pub const ENTERPRISE_PLUGIN: &str = "dcos-enterprise-cli";

/// Skip the login flow and use this ACS token.
const TOKEN_ENV: &str = "DCOS_CLUSTER_SETUP_ACS_TOKEN";
/// Skip installing the default plugins.
const SKIP_PLUGINS_ENV: &str = "DCOS_CLUSTER_SETUP_SKIP_CANONICAL_URL_INSTALL";

#[derive(Debug, Clone, Default, Args)]
pub struct SetupFlags {
    /// Specify a custom name for the cluster
    #[arg(long)]
    pub name: Option<String>,

    /// Allow requests to bypass TLS certificate verification (insecure)
    #[arg(long)]
    pub insecure: bool,

    /// Do not check CA certificate downloaded from cluster (insecure)
    #[arg(long)]
    pub no_check: bool,

    /// Specify the path to a file with trusted CAs to verify requests against
    #[arg(long = "ca-certs")]
    pub ca_certs: Option<PathBuf>,

    /// Disable the request timeout during setup
    #[arg(long)]
    pub no_timeout: bool,

    /// Do not install the default plugins
    #[arg(long)]
    pub no_plugin: bool,

    #[command(flatten)]
    pub login: LoginFlags,
}

/// Hosts serving the default plugin packages.
#[derive(Debug, Clone)]
pub struct DownloadHosts {
    pub oss: String,
    pub enterprise: String,
}

impl Default for DownloadHosts {
    fn default() -> Self {
        Self {
            oss: "https://downloads.dcos.io".into(),
            enterprise: "https://downloads.mesosphere.io".into(),
        }
    }
}

pub struct Setup<'a> {
    prompt: &'a dyn Prompt,
    opener: &'a dyn Opener,
    manager: &'a ConfigManager,
    runner: Arc<dyn CommandRunner>,
    env: EnvLookup,
    downloads: DownloadHosts,
}

impl<'a> Setup<'a> {
    pub fn new(
        prompt: &'a dyn Prompt,
        opener: &'a dyn Opener,
        manager: &'a ConfigManager,
        runner: Arc<dyn CommandRunner>,
        env: EnvLookup,
    ) -> Self {
        Self {
            prompt,
            opener,
            manager,
            runner,
            env,
            downloads: DownloadHosts::default(),
        }
    }

    pub fn with_download_hosts(mut self, downloads: DownloadHosts) -> Self {
        self.downloads = downloads;
        self
    }

    /// Run the whole setup for `url` and return the saved cluster.
    pub fn configure(&self, flags: &SetupFlags, url: &str, attach: bool) -> Result<Cluster> {
        tracing::info!("setting up the cluster");

        let mut url = normalize_url(url);
        let timeout = (!flags.no_timeout).then_some(SETUP_TIMEOUT);
        let https = url.starts_with("https://");

        let mut ca_bundle = match &flags.ca_certs {
            Some(path) => Some(
                fs::read(path).with_context(|| format!("couldn't read {}", path.display()))?,
            ),
            None => None,
        };

        let mut tls = Tls::default();
        if https {
            if flags.insecure {
                tls = Tls::insecure();
            } else if let Some(bundle) = &ca_bundle {
                tls = trust_bundle(bundle, None)?;
            }
        }

        for _ in 0..2 {
            let options = HttpOptions::new(url.clone())
                .with_timeout(timeout)
                .with_tls(tls.clone());
            match canonical_url(&options) {
                Ok(canonical) => {
                    if canonical != url {
                        Output::warning(format!("Continuing cluster setup with: {canonical}"));
                        url = canonical;
                    }
                    break;
                }
                Err(err) if https && !tls.insecure && ca_bundle.is_none() && err.is_unknown_authority() => {
                    tracing::info!("cluster certificate is signed by an unknown authority");
                    let bundle = download_ca_bundle(&options)
                        .context("couldn't download the cluster CA bundle")?;
                    let prompt = (!flags.no_check).then_some(self.prompt);
                    tls = trust_bundle(&bundle, prompt)?;
                    ca_bundle = Some(bundle);
                }
                Err(err) => return Err(err).with_context(|| format!("couldn't reach {url}")),
            }
        }

        let options = HttpOptions::new(url.clone())
            .with_timeout(timeout)
            .with_tls(tls.clone());
        let token = match (self.env)(TOKEN_ENV).filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => self.login(&flags.login, &options)?,
        };

        let http = HttpClient::new(options.with_token(token.clone()))?;
        let metadata = dcos_api::metadata(&http).context("couldn't read the cluster metadata")?;
        if metadata.cluster_id.is_empty() {
            bail!("the cluster didn't report its ID");
        }

        let mut cluster = Cluster::new(self.manager.new_config());
        cluster.set_url(&url)?;
        cluster.set_acs_token(&token)?;
        if tls.insecure {
            cluster.set_tls(&tls)?;
        }
        let name = match flags.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => match dcos_api::state_summary(&http) {
                Ok(summary) if !summary.cluster.is_empty() => summary.cluster,
                Ok(_) => metadata.cluster_id.clone(),
                Err(err) => {
                    tracing::debug!("couldn't read the mesos state summary: {err}");
                    metadata.cluster_id.clone()
                }
            },
        };
        cluster.set_name(&name)?;

        let mut store = cluster.into_config();
        self.manager
            .save(&mut store, &metadata.cluster_id, ca_bundle.as_deref())
            .context("couldn't save the cluster config")?;
        if attach {
            self.manager.attach(&store)?;
            tracing::info!("attached to cluster {}", metadata.cluster_id);
        }
        let cluster = Cluster::new(store);

        if !flags.no_plugin {
            self.install_default_plugins(&cluster, &http);
        }

        Output::success(format!("{url} is now setup"));
        Ok(cluster)
    }

    fn login(&self, flags: &LoginFlags, options: &HttpOptions) -> Result<String> {
        let http = HttpClient::new(options.clone())?;
        match LoginFlow::new(self.prompt, self.opener, self.env.clone()).start(flags, &http) {
            Ok(token) => Ok(token),
            Err(LoginError::AuthDisabled) => {
                Output::warning("This cluster does not require authenticated requests. Skipping login.");
                Ok(String::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Install the core plugin, and the enterprise one on enterprise
    /// clusters. Failures are reported but never abort setup.
    fn install_default_plugins(&self, cluster: &Cluster, http: &HttpClient) {
        if (self.env)(SKIP_PLUGINS_ENV).and_then(|v| parse_bool(&v)) == Some(true) {
            tracing::info!("skipping default plugin installation ({SKIP_PLUGINS_ENV})");
            return;
        }
        let Some(dir) = cluster.dir() else {
            return;
        };

        let version = match dcos_api::version(http) {
            Ok(version) => version,
            Err(err) => {
                Output::warning(format!(
                    "Unable to get DC/OS version, installation of the plugins aborted: {err}"
                ));
                return;
            }
        };
        let Some(release) = release_line(&version.version) else {
            Output::warning(format!(
                "Unable to parse DC/OS version {}, installation of the plugins aborted",
                version.version
            ));
            return;
        };
        if release < (1, 10) {
            Output::warning("DC/OS version of the cluster < 1.10, installation of the plugins aborted");
            return;
        }

        let plugins = PluginManager::new(dir, self.runner.clone());
        let release = format!("{}.{}", release.0, release.1);

        if let Err(err) = self.install_plugin(&plugins, CORE_PLUGIN, &self.downloads.oss, &release) {
            Output::warning(format!("Couldn't install {CORE_PLUGIN}: {err}"));
        }
        match version.variant.as_str() {
            "enterprise" => {
                if let Err(err) =
                    self.install_plugin(&plugins, ENTERPRISE_PLUGIN, &self.downloads.enterprise, &release)
                {
                    tracing::debug!("couldn't install {ENTERPRISE_PLUGIN}: {err}");
                }
            }
            "" => Output::hint(format!(
                "Please run \"dcos package install {ENTERPRISE_PLUGIN}\" if you use a DC/OS Enterprise cluster"
            )),
            _ => {}
        }

        let mut commands: Vec<String> = plugins
            .plugins()
            .iter()
            .flat_map(|p| p.command_names().into_iter().map(str::to_string).collect::<Vec<_>>())
            .collect();
        commands.sort();
        if !commands.is_empty() {
            Output::info(format!("New commands available: {}", commands.join(", ")));
        }
    }

    fn install_plugin(
        &self,
        plugins: &PluginManager,
        name: &str,
        host: &str,
        release: &str,
    ) -> Result<(), PluginError> {
        tracing::info!("installing {name}");
        let (stable, testing) = plugin_urls(host, name, platform(), release);

        let probe = HttpClient::new(HttpOptions::new(stable.clone()).with_timeout(Some(SETUP_TIMEOUT)))?;
        let url = if probe.head(&stable)?.status().is_client_error() {
            testing
        } else {
            stable
        };

        let opts = InstallOpts {
            name: Some(name.to_string()),
            update: true,
            ..Default::default()
        };
        match plugins.install(&url, &opts) {
            Ok(_) | Err(PluginError::AlreadyInstalled(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Default to `https://` and drop trailing slashes.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// `HEAD /` without following redirects. A redirect moves setup to the
/// origin of its `Location`.
pub fn canonical_url(options: &HttpOptions) -> Result<String, HttpError> {
    let client = HttpClient::new(options.clone().without_redirects())?;
    let resp = client.head("/")?;

    if resp.status().is_redirection() {
        if let Some(location) = resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()) {
            let target = client.url(location)?;
            return Ok(target.origin().ascii_serialization());
        }
    }
    Ok(client.base_url().as_str().trim_end_matches('/').to_string())
}

/// Major and minor numbers of a DC/OS version such as `1.12.3-dev`.
pub fn release_line(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.splitn(3, '.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    Some((major, minor.parse().ok()?))
}

/// Release and testing download URLs of a default plugin.
pub fn plugin_urls(host: &str, name: &str, platform: &str, release: &str) -> (String, String) {
    let host = host.trim_end_matches('/');
    (
        format!("{host}/cli/releases/plugins/{name}/{platform}/x86-64/{name}-{release}-patch.latest.zip"),
        format!("{host}/cli/testing/plugins/{name}/{platform}/x86-64/{name}-{release}-patch.x.zip"),
    )
}

/// Platform segment of plugin download URLs.
pub fn platform() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}
