use reqwest::StatusCode;
use reqwest::blocking::Response;
use serde::{Deserialize, Serialize};

use crate::config::{Cluster, ConfigStore};
use crate::env::EnvLookup;
use crate::error::{ApiError, ConfigError, LinkError};
use crate::httpclient::{HttpClient, decode_json};

const LINKS_PATH: &str = "/cluster/v1/links";

/// A link from the attached cluster to another one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub login_provider: LinkProvider,
}

/// The provider users of the linked cluster log in with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkProvider {
    pub id: String,
    #[serde(rename = "type")]
    pub provider_type: String,
}

#[derive(Debug, Deserialize)]
struct Links {
    #[serde(default)]
    links: Vec<Link>,
}

impl Link {
    /// An unpersisted cluster standing in for a linked cluster with no local
    /// config.
    pub fn to_cluster(&self, env: EnvLookup) -> Result<Cluster, ConfigError> {
        let mut cluster = Cluster::new(ConfigStore::new(env));
        cluster.set_id(self.id.clone());
        cluster.set_url(&self.url)?;
        cluster.set_name(&self.name)?;
        Ok(cluster)
    }
}

/// Client for the links API of the attached cluster.
#[derive(Debug, Clone)]
pub struct Linker {
    http: HttpClient,
}

impl Linker {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn links(&self) -> Result<Vec<Link>, LinkError> {
        let resp = self
            .http
            .get(LINKS_PATH)
            .map_err(|_| LinkError::Failed("get linked clusters"))?;
        let resp = check(resp, "find linked clusters")?;
        Ok(decode_json::<Links>(resp)?.links)
    }

    pub fn link(&self, link: &Link) -> Result<(), LinkError> {
        tracing::info!("linking the cluster");
        let resp = self.http.post_json(LINKS_PATH, link)?;
        check(resp, "link cluster")?;
        tracing::info!("linked current cluster to cluster {}", link.id);
        Ok(())
    }

    pub fn unlink(&self, id: &str) -> Result<(), LinkError> {
        tracing::info!("unlinking the cluster");
        let resp = self.http.delete(&format!("{LINKS_PATH}/{id}"))?;
        check(resp, "unlink cluster")?;
        tracing::info!("unlinked current cluster from cluster {id}");
        Ok(())
    }
}

fn check(resp: Response, action: &'static str) -> Result<Response, LinkError> {
    match resp.status() {
        StatusCode::OK => Ok(resp),
        StatusCode::NOT_FOUND => Err(LinkError::Inaccessible(action)),
        _ => match resp.json::<ApiError>() {
            Ok(api) if !api.description.is_empty() => Err(api.into()),
            _ => Err(LinkError::Failed(action)),
        },
    }
}
