//! `dbxops benchmark` - dbt versus DLT benchmark.
//!
//! # Usage
//!
//! ```bash
//! # Load use cases and sizing dimensions into the store
//! dbxops benchmark setup --plan benchmark.yml
//!
//! # Run every pending configuration of one use case
//! dbxops benchmark run --use-case full_load
//!
//! # Average durations of the SUCCESS runs
//! dbxops benchmark report
//! ```

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cli::config::{default_benchmark_db, workspace_path, DatabricksArgs};
use crate::cli::error::HelpfulError;
use crate::cli::output::print_table;
use dbxops::benchmark::report::{report_rows, REPORT_HEADERS};
use dbxops::benchmark::{run_benchmark, BenchmarkOptions};
use dbxops::notify::TeamsNotifier;
use dbxops::{DatabricksConnector, PollPolicy};
use dbxops_db::{BenchmarkDb, BenchmarkPlan};

#[derive(Debug, Subcommand)]
pub enum BenchmarkCommand {
    /// Load a benchmark plan into the store (idempotent)
    Setup(SetupArgs),
    /// Run the pending configurations of a use case
    Run(RunArgs),
    /// Show average durations per configuration
    Report(ReportArgs),
}

#[derive(Debug, Args)]
pub struct SetupArgs {
    /// YAML benchmark plan
    #[arg(long)]
    pub plan: PathBuf,

    /// Benchmark store (default: ~/.dbxops/benchmark.sqlite3)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[arg(long)]
    pub use_case: String,

    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Seconds between job run polls
    #[arg(long, default_value_t = PollPolicy::JOB_RUN.interval.as_secs())]
    pub job_poll_interval: u64,

    /// Polls before a job run counts as timed out
    #[arg(long, default_value_t = PollPolicy::JOB_RUN.max_polls)]
    pub job_max_polls: u32,

    /// Seconds between pipeline update polls
    #[arg(long, default_value_t = PollPolicy::PIPELINE_UPDATE.interval.as_secs())]
    pub pipeline_poll_interval: u64,

    #[arg(long, default_value_t = PollPolicy::PIPELINE_UPDATE.max_polls)]
    pub pipeline_max_polls: u32,

    /// Summary is posted here when the benchmark ends
    #[arg(long, env = "TEAMS_WEBHOOK_URL", hide_env_values = true)]
    pub teams_webhook_url: Option<String>,

    #[command(flatten)]
    pub databricks: DatabricksArgs,
}

impl RunArgs {
    fn options(&self) -> BenchmarkOptions {
        BenchmarkOptions {
            job_run: PollPolicy::new(Duration::from_secs(self.job_poll_interval), self.job_max_polls),
            pipeline_update: PollPolicy::new(
                Duration::from_secs(self.pipeline_poll_interval),
                self.pipeline_max_polls,
            ),
            warehouse: None,
        }
    }
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Only this use case
    #[arg(long)]
    pub use_case: Option<String>,

    #[arg(long)]
    pub db: Option<PathBuf>,
}

pub fn run(command: BenchmarkCommand) -> Result<()> {
    // Two lineages run on their own tasks.
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    rt.block_on(async {
        match command {
            BenchmarkCommand::Setup(args) => setup(args).await,
            BenchmarkCommand::Run(args) => run_lineages(args).await,
            BenchmarkCommand::Report(args) => report(args).await,
        }
    })
}

fn db_path(db: Option<&Path>) -> PathBuf {
    db.map(workspace_path).unwrap_or_else(default_benchmark_db)
}

async fn open_existing(db: Option<&Path>) -> Result<BenchmarkDb> {
    let path = db_path(db);
    if !path.is_file() {
        return Err(HelpfulError::benchmark_store_missing(&path).into());
    }
    BenchmarkDb::open(&path)
        .await
        .with_context(|| format!("Opening benchmark store {}", path.display()))
}

async fn setup(args: SetupArgs) -> Result<()> {
    let plan_path = workspace_path(&args.plan);
    if !plan_path.is_file() {
        return Err(HelpfulError::file_not_found(&plan_path).into());
    }
    let plan = BenchmarkPlan::from_file(&plan_path)?;

    let path = db_path(args.db.as_deref());
    let db = BenchmarkDb::open(&path).await?;
    let summary = db.apply_plan(&plan).await?;
    db.close().await;

    println!(
        "Added {} use case(s), {} DBT and {} DLT configuration(s) to {}.",
        summary.use_cases_added,
        summary.dbt_configs_added,
        summary.dlt_configs_added,
        path.display()
    );
    Ok(())
}

async fn run_lineages(args: RunArgs) -> Result<()> {
    let db = open_existing(args.db.as_deref()).await?;
    let settings = args.databricks.settings().for_benchmark();
    let connector = Arc::new(DatabricksConnector::new(&settings)?);

    let summary = run_benchmark(db.clone(), connector, &args.use_case, args.options()).await;
    let message = summary.message();
    println!("{}", message);

    if let Some(notifier) = TeamsNotifier::from_url(args.teams_webhook_url.as_deref()) {
        let title = format!("Benchmark '{}'", args.use_case);
        if let Err(e) = notifier.send(&title, &message, summary.succeeded()).await {
            warn!("Failed to notify Teams: {}", e);
        }
    }

    db.close().await;
    summary.into_result()?;
    Ok(())
}

async fn report(args: ReportArgs) -> Result<()> {
    let db = open_existing(args.db.as_deref()).await?;
    let averages = db.average_durations(args.use_case.as_deref()).await?;
    db.close().await;

    if averages.is_empty() {
        println!("No successful runs recorded yet.");
        return Ok(());
    }
    print_table(REPORT_HEADERS, report_rows(&averages));
    Ok(())
}
