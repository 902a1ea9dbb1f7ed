//! `dcos cluster`: manage the configured clusters.

use std::fs;

use anyhow::{Context as _, Result, bail};
use clap::{Args, Subcommand};
use reqwest::Url;

use crate::cluster::{Filters, Item, Link, LinkProvider, Linker, Lister, Status};
use crate::config::{Cluster, keys};
use crate::context::Context;
use crate::error::ConfigError;
use crate::login::{LoginClient, Provider};
use crate::output::Output;
use crate::prompt::select_item;
use crate::setup::SetupFlags;

#[derive(Debug, Args)]
pub struct ClusterArgs {
    #[command(subcommand)]
    pub action: ClusterAction,
}

#[derive(Debug, Subcommand)]
pub enum ClusterAction {
    /// List the clusters configured and the ones linked to the current cluster
    List {
        /// Only show the attached cluster
        #[arg(long)]
        attached: bool,

        /// Print clusters in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Attach the CLI to a cluster
    Attach { cluster: String },
    /// Remove a configured cluster from the CLI
    Remove {
        #[arg(
            conflicts_with_all = ["all", "unavailable"],
            required_unless_present_any = ["all", "unavailable"]
        )]
        cluster: Option<String>,

        /// Remove all clusters
        #[arg(long)]
        all: bool,

        /// Remove unavailable clusters
        #[arg(long)]
        unavailable: bool,
    },
    /// Rename a configured cluster
    Rename { cluster: String, name: String },
    /// Set up the CLI to communicate with a cluster
    Setup {
        url: String,

        #[command(flatten)]
        flags: SetupFlags,
    },
    /// Link the current cluster to another one
    Link {
        cluster: String,

        #[command(flatten)]
        flags: SetupFlags,
    },
    /// Unlink the current cluster from another one
    Unlink { cluster: String },
    /// Open the current cluster UI in the browser
    Open { cluster: Option<String> },
}

pub fn run(args: ClusterArgs, ctx: &Context) -> Result<()> {
    match args.action {
        ClusterAction::List { attached, json } => list(ctx, attached, json),
        ClusterAction::Attach { cluster } => {
            let manager = ctx.config_manager();
            let config = manager.find(&cluster, false)?;
            manager.attach(&config)?;
            Output::success(format!("Attached to {}", Cluster::new(config).name()));
            Ok(())
        }
        ClusterAction::Remove {
            cluster,
            all,
            unavailable,
        } => remove(ctx, cluster.as_deref(), all, unavailable),
        ClusterAction::Rename { cluster, name } => {
            let mut config = ctx.config_manager().find(&cluster, false)?;
            config.set(keys::CLUSTER_NAME, name.as_str())?;
            config.persist()?;
            Output::success(format!("Renamed {cluster} to {name}"));
            Ok(())
        }
        ClusterAction::Setup { url, flags } => {
            ctx.setup().configure(&flags, &url, true)?;
            Ok(())
        }
        ClusterAction::Link { cluster, flags } => link(ctx, &cluster, &flags),
        ClusterAction::Unlink { cluster } => unlink(ctx, &cluster),
        ClusterAction::Open { cluster } => {
            let cluster = match cluster {
                Some(name) => Cluster::new(ctx.config_manager().find(&name, false)?),
                None => ctx.cluster()?,
            };
            ctx.opener().open(&cluster.url())
        }
    }
}

fn list(ctx: &Context, attached_only: bool, json: bool) -> Result<()> {
    if attached_only {
        ctx.cluster()?;
    }
    let items = Lister::new(ctx.config_manager()).list(&Filters {
        attached_only,
        linked: true,
        ..Default::default()
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        Output::table(&list_rows(&items));
    }
    Ok(())
}

fn list_rows(items: &[Item]) -> Vec<Vec<String>> {
    let header = ["", "NAME", "ID", "STATUS", "VERSION", "URL"];
    let mut rows = vec![header.iter().map(|h| h.to_string()).collect::<Vec<_>>()];
    for item in items {
        rows.push(vec![
            if item.attached { "*" } else { "" }.to_string(),
            item.name.clone(),
            item.id.clone(),
            item.status.to_string(),
            item.version.clone(),
            item.url.clone(),
        ]);
    }
    rows
}

fn remove(ctx: &Context, cluster: Option<&str>, all: bool, unavailable: bool) -> Result<()> {
    let manager = ctx.config_manager();
    if let Some(name) = cluster {
        let config = manager.find(name, false)?;
        manager.remove(&config)?;
        Output::success(format!("Removed cluster {name}"));
        return Ok(());
    }
    if !all && !unavailable {
        bail!("either a cluster name or one of the --all / --unavailable option must be passed");
    }

    let filters = Filters {
        status: unavailable.then_some(Status::Unavailable),
        ..Default::default()
    };
    for item in Lister::new(manager).list(&filters) {
        let Some(dir) = &item.dir else {
            continue;
        };
        fs::remove_dir_all(dir).with_context(|| format!("couldn't remove {}", dir.display()))?;
        Output::success(format!("Removed cluster {}", item.id));
    }
    Ok(())
}

fn link(ctx: &Context, name: &str, flags: &SetupFlags) -> Result<()> {
    let attached = ctx.cluster()?;
    let manager = ctx.config_manager();

    let linkable = match manager.find(name, false) {
        Ok(config) => Cluster::new(config),
        Err(ConfigError::NotFound) => {
            // Not configured yet: a URL can be set up on the spot.
            if Url::parse(name).is_err() {
                bail!("unable to retrieve cluster {name}");
            }
            let setup_now = ctx
                .prompt()
                .confirm(&format!("{name} is not set up in the CLI, would you like to do it now?"), true)?;
            if !setup_now {
                bail!("unable to retrieve cluster {name}");
            }
            ctx.setup().configure(flags, name, false)?
        }
        Err(err) => return Err(err.into()),
    };

    if linkable.config().path() == attached.config().path() {
        bail!("cannot link a cluster to itself");
    }

    let providers: Vec<Provider> = LoginClient::new(ctx.http_client(&linkable)?)
        .providers()?
        .iter()
        .cloned()
        .collect();
    let provider = match providers.as_slice() {
        [] => bail!("couldn't determine a login provider"),
        [provider] => provider,
        _ => select_item(ctx.prompt(), "Please select a login method:", &providers)?,
    };

    let link = Link {
        id: linkable.id(),
        name: linkable.name(),
        url: linkable.url(),
        login_provider: LinkProvider {
            id: provider.id.clone(),
            provider_type: provider.provider_type.to_string(),
        },
    };
    Linker::new(ctx.http_client(&attached)?).link(&link)?;
    Output::success(format!("Linked {} to {}", attached.name(), link.name));
    Ok(())
}

fn unlink(ctx: &Context, name: &str) -> Result<()> {
    let attached = ctx.cluster()?;
    let linker = Linker::new(ctx.http_client(&attached)?);

    let id = match ctx.config_manager().find(name, false) {
        Ok(config) => Cluster::new(config).id(),
        Err(ConfigError::NotFound) => linked_id(&linker, name)?,
        Err(err) => return Err(err.into()),
    };
    if id == attached.id() {
        bail!("cannot unlink a cluster from itself");
    }
    linker.unlink(&id)?;
    Output::success(format!("Unlinked {name}"));
    Ok(())
}

/// Resolve a cluster that is only known as a link of the attached cluster.
fn linked_id(linker: &Linker, name: &str) -> Result<String> {
    let links = linker.links()?;
    let mut matches = links.iter().filter(|l| l.id == name || l.name == name);
    match (matches.next(), matches.next()) {
        (Some(link), None) => Ok(link.id.clone()),
        (Some(_), Some(_)) => Err(ConfigError::TooManyConfigs.into()),
        (None, _) => bail!("unable to retrieve cluster {name}"),
    }
}
