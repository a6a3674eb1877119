//! `dbxops token` - print a fresh workspace access token.
//!
//! The token goes to stdout and nothing else does, so a workflow step can
//! capture it directly.

use anyhow::Result;
use clap::Args;
use tracing::debug;

use crate::cli::config::DatabricksArgs;
use crate::cli::error::HelpfulError;
use crate::cli::output::mask_secret;

#[derive(Debug, Args)]
pub struct TokenArgs {
    #[command(flatten)]
    pub databricks: DatabricksArgs,
}

pub fn run(args: TokenArgs) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async { run_async(args).await })
}

async fn run_async(args: TokenArgs) -> Result<()> {
    let settings = args.databricks.settings();
    let provider = settings.provider()?;
    let token = provider
        .access_token()
        .await
        .map_err(|e| HelpfulError::authentication_failed(&settings.host, &e.to_string()))?;

    debug!(platform = %provider.platform(), token = %mask_secret(&token), "Issued workspace token");
    println!("{}", token);
    Ok(())
}
