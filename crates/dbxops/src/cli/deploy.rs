//! `dbxops deploy` - upload a new wheel version to the workspace.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::cli::config::{workspace_path, DatabricksArgs};
use crate::cli::error::HelpfulError;
use dbxops::actions::WorkflowCommands;
use dbxops::deploy::deploy;
use dbxops::wheel::wheel_folder;

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Name of the wheel; its folder is /Shared/<name>
    #[arg(long)]
    pub wheel_name: String,

    /// Wheel file to upload
    #[arg(long)]
    pub source: PathBuf,

    #[command(flatten)]
    pub databricks: DatabricksArgs,
}

pub fn run(args: DeployArgs) -> Result<()> {
    let source = workspace_path(&args.source);
    if !source.is_file() {
        return Err(HelpfulError::file_not_found(&source).into());
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async { run_async(args, source).await })
}

async fn run_async(args: DeployArgs, source: PathBuf) -> Result<()> {
    let client = args.databricks.settings().client().await?;
    let folder = wheel_folder(&args.wheel_name);

    let outcome = deploy(&client, &source, &folder, &WorkflowCommands).await?;
    println!("Deploying wheel version: {}.", outcome.version);
    if outcome.deployed {
        println!("Deployed '{}'.", outcome.target_path);
        println!("Done.");
    }
    Ok(())
}
