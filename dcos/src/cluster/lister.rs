use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use serde::Serialize;

use super::Linker;
use crate::config::{Cluster, ConfigManager};
use crate::dcos_api;
use crate::httpclient::{HttpClient, HttpOptions};

/// Timeout for the version probe sent to each listed cluster.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPERCASE")]
pub enum Status {
    Available,
    Unavailable,
    /// Linked to the attached cluster but never set up locally.
    Unconfigured,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Available => "AVAILABLE",
            Status::Unavailable => "UNAVAILABLE",
            Status::Unconfigured => "UNCONFIGURED",
        })
    }
}

/// One row of `dcos cluster list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub attached: bool,
    pub id: String,
    pub name: String,
    pub status: Status,
    pub url: String,
    pub version: String,
    /// Directory of the local config, if any.
    #[serde(skip)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub attached_only: bool,
    pub status: Option<Status>,
    /// Include clusters linked to the attached one.
    pub linked: bool,
}

/// Lists configured clusters, and optionally the ones linked to the
/// attached cluster, probing each for its version.
#[derive(Debug)]
pub struct Lister<'a> {
    manager: &'a ConfigManager,
}

impl<'a> Lister<'a> {
    pub fn new(manager: &'a ConfigManager) -> Self {
        Self { manager }
    }

    /// Items sorted by name, whatever order the probes finish in.
    pub fn list(&self, filters: &Filters) -> Vec<Item> {
        let current = self.manager.current().ok().map(Cluster::new);
        let current_path = current
            .as_ref()
            .and_then(|c| c.config().path().map(PathBuf::from));

        tracing::info!("reading configured clusters");
        let mut clusters: Vec<Cluster> = self.manager.all().into_iter().map(Cluster::new).collect();

        if filters.linked && !filters.attached_only {
            if let Some(current) = &current {
                clusters.extend(linked_clusters(current, &clusters));
            }
        }

        let items = Mutex::new(Vec::with_capacity(clusters.len()));
        thread::scope(|scope| {
            for cluster in &clusters {
                let attached = current_path.is_some()
                    && cluster.config().path() == current_path.as_deref();
                if filters.attached_only && !attached {
                    continue;
                }

                let items = &items;
                scope.spawn(move || {
                    let item = probe(cluster, attached);
                    if filters.status.is_some_and(|status| status != item.status) {
                        return;
                    }
                    let mut items = items.lock().unwrap_or_else(PoisonError::into_inner);
                    let pos = items
                        .iter()
                        .position(|existing: &Item| existing.name > item.name)
                        .unwrap_or(items.len());
                    items.insert(pos, item);
                });
            }
        });
        items.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

fn linked_clusters(current: &Cluster, configured: &[Cluster]) -> Vec<Cluster> {
    tracing::info!("fetching linked clusters");
    let linker = match probe_client(current) {
        Ok(http) => Linker::new(http),
        Err(err) => {
            tracing::debug!("cannot reach the attached cluster: {err}");
            return Vec::new();
        }
    };

    let links = match linker.links() {
        Ok(links) => links,
        Err(err) => {
            tracing::debug!("{err}");
            return Vec::new();
        }
    };

    links
        .iter()
        .filter(|link| !configured.iter().any(|c| c.id() == link.id))
        .filter_map(|link| link.to_cluster(current.config().env().clone()).ok())
        .collect()
}

fn probe_client(cluster: &Cluster) -> anyhow::Result<HttpClient> {
    let opts = HttpOptions::for_cluster(cluster)?.with_timeout(Some(PROBE_TIMEOUT));
    Ok(HttpClient::new(opts)?)
}

fn probe(cluster: &Cluster, attached: bool) -> Item {
    let mut item = Item {
        attached,
        id: cluster.id(),
        name: cluster.name(),
        status: Status::Unavailable,
        url: cluster.url(),
        version: "UNKNOWN".into(),
        dir: cluster.dir().map(PathBuf::from),
    };

    let version = probe_client(cluster)
        .and_then(|http| dcos_api::version(&http).map_err(anyhow::Error::from));
    match version {
        Ok(version) => {
            item.status = Status::Available;
            item.version = version.version;
        }
        Err(err) => tracing::debug!(cluster = %item.name, "version probe failed: {err}"),
    }

    if item.dir.is_none() {
        item.status = Status::Unconfigured;
    }
    item
}
