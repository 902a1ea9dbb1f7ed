//! Cluster metadata endpoints used during setup and listing.

use serde::Deserialize;

use crate::error::HttpError;
use crate::httpclient::HttpClient;

/// `GET /metadata`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Metadata {
    #[serde(rename = "CLUSTER_ID", default)]
    pub cluster_id: String,
    #[serde(rename = "PUBLIC_IPV4", default)]
    pub public_ipv4: String,
}

/// `GET /dcos-metadata/dcos-version.json`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Version {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "dcos-variant", default)]
    pub variant: String,
}

/// `GET /mesos/state-summary`, reduced to the fields the CLI reads.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct StateSummary {
    #[serde(default)]
    pub cluster: String,
}

pub fn metadata(client: &HttpClient) -> Result<Metadata, HttpError> {
    client.get_json("/metadata")
}

pub fn version(client: &HttpClient) -> Result<Version, HttpError> {
    client.get_json("/dcos-metadata/dcos-version.json")
}

pub fn state_summary(client: &HttpClient) -> Result<StateSummary, HttpError> {
    client.get_json("/mesos/state-summary")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::httpclient::HttpOptions;

    #[test]
    fn decodes_metadata_and_version() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/metadata")
            .with_body(r#"{"CLUSTER_ID":"79f2-abc","PUBLIC_IPV4":"10.0.0.1"}"#)
            .create();
        server
            .mock("GET", "/dcos-metadata/dcos-version.json")
            .with_body(r#"{"version":"1.13.0","dcos-variant":"enterprise","dcos-image-commit":"x"}"#)
            .create();
        server
            .mock("GET", "/mesos/state-summary")
            .with_body(r#"{"cluster":"prod","slaves":[]}"#)
            .create();

        let client = HttpClient::new(HttpOptions::new(server.url())).unwrap();
        assert_eq!(metadata(&client).unwrap().cluster_id, "79f2-abc");
        let v = version(&client).unwrap();
        assert_eq!((v.version.as_str(), v.variant.as_str()), ("1.13.0", "enterprise"));
        assert_eq!(state_summary(&client).unwrap().cluster, "prod");
    }
}
