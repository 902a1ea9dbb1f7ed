//! Multi-cluster configuration.
//!
//! Every configured cluster lives in its own directory under
//! `<root>/clusters/<cluster-id>/`, holding a `dcos.toml` document, an
//! optional `dcos_ca.crt` bundle and, for at most one cluster, a zero-byte
//! `attached` marker.
//!
//! - [`ConfigStore`]: dotted-key access to one TOML document, with
//!   environment overrides for a handful of keys.
//! - [`Cluster`]: typed accessors over a store.
//! - [`ConfigManager`]: discovery, lookup and attachment across clusters.

mod cluster;
mod manager;
mod store;

pub use cluster::{Cluster, DEFAULT_TIMEOUT, Tls};
pub use manager::{ConfigManager, ATTACHED_FILE, CA_FILE, CONFIG_FILE};
pub use store::ConfigStore;

/// Well-known config keys.
pub mod keys {
    pub const URL: &str = "core.dcos_url";
    pub const ACS_TOKEN: &str = "core.dcos_acs_token";
    pub const TLS: &str = "core.ssl_verify";
    pub const TIMEOUT: &str = "core.timeout";
    pub const SSH_USER: &str = "core.ssh_user";
    pub const SSH_PROXY_IP: &str = "core.ssh_proxy_ip";
    pub const PAGINATION: &str = "core.pagination";
    pub const REPORTING: &str = "core.reporting";
    pub const MESOS_MASTER_URL: &str = "core.mesos_master_url";
    pub const PROMPT_LOGIN: &str = "core.prompt_login";
    pub const CLUSTER_NAME: &str = "cluster.name";
}

/// Keys whose value can be overridden by an environment variable at read time.
pub const ENV_OVERRIDES: &[(&str, &str)] = &[
    (keys::URL, "DCOS_URL"),
    (keys::ACS_TOKEN, "DCOS_ACS_TOKEN"),
    (keys::TLS, "DCOS_SSL_VERIFY"),
    (keys::TIMEOUT, "DCOS_TIMEOUT"),
];

/// Documented config keys and what they control.
pub fn known_keys() -> Vec<(&'static str, &'static str)> {
    let mut known = vec![
        (keys::ACS_TOKEN, "the DC/OS authentication token"),
        (keys::URL, "the public master URL of your DC/OS cluster"),
        (
            keys::MESOS_MASTER_URL,
            "the Mesos master URL (defaults to 'core.dcos_url')",
        ),
        (
            keys::PAGINATION,
            "indicates whether to paginate output (defaults to true)",
        ),
        (
            keys::TLS,
            "indicates whether to verify SSL certificates or set the path to the SSL certificates",
        ),
        (
            keys::TIMEOUT,
            "the request timeout in seconds, with a minimum value of 1 second (defaults to 3 minutes)",
        ),
        (
            keys::SSH_USER,
            "the user used when using ssh to connect to a node of your DC/OS cluster (defaults to 'core')",
        ),
        (
            keys::SSH_PROXY_IP,
            "whether to use a fixed ssh proxy host (Bastion) for node SSH access",
        ),
        (keys::REPORTING, "whether to report usage events to Mesosphere"),
        (
            keys::PROMPT_LOGIN,
            "whether to prompt the user to log in when token expired, otherwise automatically initiate login",
        ),
        (keys::CLUSTER_NAME, "human readable name of cluster"),
        ("job.url", "API URL for talking to the Metronome scheduler"),
        ("job.service_name", "the name of the metronome cluster"),
        (
            "marathon.url",
            "base URL for talking to Marathon, overwrites the value specified in 'core.dcos_url'",
        ),
        (
            "package.cosmos_url",
            "base URL for talking to Cosmos, overwrites the value specified in 'core.dcos_url'",
        ),
    ];
    known.sort_by_key(|(key, _)| *key);
    known
}
