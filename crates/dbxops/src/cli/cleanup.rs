//! `dbxops cleanup` - remove wheels outside the retention policy.

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use crate::cli::config::DatabricksArgs;
use dbxops::cleanup::{cleanup, DELETE_DELAY};
use dbxops::RetentionPolicy;

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Name of the wheel; its folder is /Shared/<name>
    #[arg(long)]
    pub wheel_name: String,

    /// Newest wheels that are always kept
    #[arg(long)]
    pub nr_of_wheels_to_keep: usize,

    /// Older wheels are kept for this many days
    #[arg(long)]
    pub nr_of_days_to_keep_wheel: u32,

    #[command(flatten)]
    pub databricks: DatabricksArgs,
}

pub fn run(args: CleanupArgs) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async { run_async(args).await })
}

async fn run_async(args: CleanupArgs) -> Result<()> {
    let client = args.databricks.settings().client().await?;
    let policy = RetentionPolicy::new(args.nr_of_wheels_to_keep, args.nr_of_days_to_keep_wheel);

    let outcome = cleanup(&client, &args.wheel_name, policy, Utc::now(), DELETE_DELAY).await?;
    println!(
        "{} previously deployed wheel(s) found in workspace path '{}'.",
        outcome.found, outcome.folder
    );
    for path in &outcome.deleted {
        println!("Deleted wheel '{}'.", path);
    }
    println!("Removed {} wheel(s) from the workspace.", outcome.deleted.len());
    outcome.check()?;
    println!("Done.");
    Ok(())
}
