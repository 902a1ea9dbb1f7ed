//! `dcos auth`: log in and out of the current cluster.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};

use crate::context::Context;
use crate::httpclient::{HttpClient, HttpOptions};
use crate::login::{LoginClient, LoginFlags, LoginFlow, Providers};
use crate::output::Output;
use crate::prompt::Selectable;

#[derive(Debug, Args)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Log in to the current cluster
    Login {
        #[command(flatten)]
        flags: LoginFlags,
    },
    /// Log out the CLI from the current cluster
    Logout,
    /// List the login providers of the current cluster, or of the one at <url>
    ListProviders {
        url: Option<String>,

        /// Print providers in JSON format
        #[arg(long)]
        json: bool,
    },
}

pub fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.action {
        AuthAction::Login { flags } => login(&flags, ctx),
        AuthAction::Logout => logout(ctx),
        AuthAction::ListProviders { url, json } => {
            let providers = list_providers(url.as_deref(), ctx)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&providers)?);
            } else {
                Output::table(&provider_rows(&providers));
            }
            Ok(())
        }
    }
}

fn login(flags: &LoginFlags, ctx: &Context) -> Result<()> {
    let mut cluster = ctx.cluster()?;
    let http = ctx.http_client(&cluster)?;
    let token = LoginFlow::new(ctx.prompt(), ctx.opener(), ctx.env().clone()).start(flags, &http)?;
    cluster.set_acs_token(&token)?;
    cluster
        .config()
        .persist()
        .context("couldn't save the ACS token")?;
    Output::success("Login successful");
    Ok(())
}

fn logout(ctx: &Context) -> Result<()> {
    let mut cluster = ctx.cluster()?;
    cluster.set_acs_token("")?;
    cluster.config().persist()?;
    Output::success("Logout successful");
    Ok(())
}

fn list_providers(url: Option<&str>, ctx: &Context) -> Result<Providers> {
    let http = match url {
        Some(url) => HttpClient::new(HttpOptions::new(url))?,
        None => ctx.http_client(&ctx.cluster()?)?,
    };
    Ok(LoginClient::new(http).providers()?)
}

fn provider_rows(providers: &Providers) -> Vec<Vec<String>> {
    let mut rows = vec![vec!["PROVIDER ID".to_string(), "LOGIN METHOD".to_string()]];
    rows.extend(
        providers
            .iter()
            .map(|p| vec![p.id.clone(), p.display_label()]),
    );
    rows
}
