//! dbt versus DLT benchmark.
//!
//! Two lineages run side by side, one per [`RunType`]. Each works through
//! the configurations of a use case that still miss SUCCESS runs: it puts
//! the workspace resources in the configuration's shape, runs the job and
//! appends the outcome to the run log. The run log is the only thing the
//! lineages share, and it is what makes a stopped benchmark resumable.
//!
//! Every run connects afresh through a [`Connector`]; a benchmark outlives
//! any single access token.

pub mod dbt;
pub mod dlt;
pub mod layout;
pub mod report;
pub mod tags;

use crate::client::DatabricksApi;
use crate::error::{Error, Result};
use crate::poll::PollPolicy;
use crate::runner::execute_run;
use async_trait::async_trait;
use dbxops_db::BenchmarkDb;
use dbxops_protocol::{RunConfig, RunLog, RunType, Sizing};
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::{error, info, info_span, Instrument};

/// Hands out an API client with a fresh token.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn DatabricksApi>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkOptions {
    pub job_run: PollPolicy,
    pub pipeline_update: PollPolicy,
    /// Fixed warehouse policy; `None` derives it from the sizing.
    pub warehouse: Option<PollPolicy>,
}

impl Default for BenchmarkOptions {
    fn default() -> Self {
        Self {
            job_run: PollPolicy::JOB_RUN,
            pipeline_update: PollPolicy::PIPELINE_UPDATE,
            warehouse: None,
        }
    }
}

#[cfg(test)]
impl BenchmarkOptions {
    pub(crate) fn fast() -> Self {
        let policy = PollPolicy::new(std::time::Duration::from_millis(1), 5);
        Self {
            job_run: policy,
            pipeline_update: policy,
            warehouse: Some(policy),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineageOutcome {
    pub configs: usize,
    pub runs: Vec<RunLog>,
}

#[derive(Debug)]
pub struct BenchmarkSummary {
    pub use_case: String,
    pub dbt: Result<LineageOutcome>,
    pub dlt: Result<LineageOutcome>,
}

impl BenchmarkSummary {
    pub fn succeeded(&self) -> bool {
        self.dbt.is_ok() && self.dlt.is_ok()
    }

    /// Plain-text summary, one line per lineage.
    pub fn message(&self) -> String {
        let line = |run_type: RunType, outcome: &Result<LineageOutcome>| match outcome {
            Ok(o) => format!(
                "{}: {} run(s) over {} configuration(s) completed.",
                run_type,
                o.runs.len(),
                o.configs
            ),
            Err(e) => format!("{}: failed: {}", run_type, e),
        };
        format!(
            "Benchmark '{}' {}.\n{}\n{}",
            self.use_case,
            if self.succeeded() { "finished" } else { "FAILED" },
            line(RunType::Dbt, &self.dbt),
            line(RunType::Dlt, &self.dlt)
        )
    }

    pub fn into_result(self) -> Result<(LineageOutcome, LineageOutcome)> {
        match (self.dbt, self.dlt) {
            (Ok(dbt), Ok(dlt)) => Ok((dbt, dlt)),
            (dbt, dlt) => {
                let failures: Vec<String> = [(RunType::Dbt, dbt.err()), (RunType::Dlt, dlt.err())]
                    .into_iter()
                    .filter_map(|(t, e)| e.map(|e| format!("{}: {}", t, e)))
                    .collect();
                Err(Error::Benchmark(failures.join("; ")))
            }
        }
    }
}

async fn run_config(
    connector: &dyn Connector,
    config: &RunConfig,
    db: &BenchmarkDb,
    options: &BenchmarkOptions,
) -> Result<Vec<RunLog>> {
    info!(
        config_id = config.id,
        "{} of {} runs left to go with {}",
        config.remaining_runs,
        config.nr_of_runs,
        config.sizing.describe()
    );

    let mut logs = Vec::new();
    for run in config.pending_run_numbers() {
        info!(config_id = config.id, "Starting run '{}'", run);
        let api = connector.connect().await?;
        match &config.sizing {
            Sizing::Dbt(sizing) => dbt::prepare_run(api.as_ref(), config, sizing, run, options).await?,
            Sizing::Dlt(sizing) => {
                dlt::prepare_run(api.as_ref(), config, sizing, run, options).await?;
            }
        }
        let log = execute_run(api.as_ref(), config.id, config.job_id, options.job_run, db).await?;
        logs.push(log);
    }
    Ok(logs)
}

/// Work through every pending configuration of one lineage. The first
/// failure ends the lineage.
pub async fn run_lineage(
    run_type: RunType,
    use_case: &str,
    db: &BenchmarkDb,
    connector: &dyn Connector,
    options: &BenchmarkOptions,
) -> Result<LineageOutcome> {
    let configs = db.pending_run_configs(run_type, use_case).await?;
    info!("{} configuration(s) with pending runs", configs.len());

    let mut outcome = LineageOutcome::default();
    for config in &configs {
        let logs = run_config(connector, config, db, options).await?;
        outcome.configs += 1;
        outcome.runs.extend(logs);
    }
    Ok(outcome)
}

fn joined(run_type: RunType, result: std::result::Result<Result<LineageOutcome>, JoinError>) -> Result<LineageOutcome> {
    let outcome = result.unwrap_or_else(|e| Err(Error::Benchmark(format!("{} lineage aborted: {}", run_type, e))));
    if let Err(e) = &outcome {
        error!(run_type = %run_type, "Lineage failed: {}", e);
    }
    outcome
}

/// Run the DBT and DLT lineages of `use_case` concurrently and wait for
/// both, whatever the other one does.
pub async fn run_benchmark(
    db: BenchmarkDb,
    connector: Arc<dyn Connector>,
    use_case: &str,
    options: BenchmarkOptions,
) -> BenchmarkSummary {
    let spawn_lineage = |run_type: RunType| {
        let db = db.clone();
        let connector = Arc::clone(&connector);
        let use_case = use_case.to_string();
        tokio::spawn(
            async move { run_lineage(run_type, &use_case, &db, connector.as_ref(), &options).await }
                .instrument(info_span!("lineage", run_type = %run_type)),
        )
    };

    let (dbt, dlt) = tokio::join!(spawn_lineage(RunType::Dbt), spawn_lineage(RunType::Dlt));
    BenchmarkSummary {
        use_case: use_case.to_string(),
        dbt: joined(RunType::Dbt, dbt),
        dlt: joined(RunType::Dlt, dlt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDatabricks;
    use dbxops_db::BenchmarkPlan;
    use dbxops_protocol::{JobRun, LifeCycleState, PipelineUpdateState, ResultState, RunState, RunStatus, RunTask};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    const PLAN: &str = r#"
nr_of_runs: 2
use_cases:
  - use_case: full_load
dbt:
  job_id: 10
  job_cluster_id: 0101-abc
  sql_warehouse_id: wh1
  use_cases: [full_load]
  serverless: [true]
  cluster_sizes:
    - size: X-Small
dlt:
  job_id: 20
  pipeline_id: tmpl
  use_cases: [full_load]
  workers:
    - nr_of_workers: 2
      photon: true
"#;

    struct SharedConnector {
        api: Arc<FakeDatabricks>,
        connects: AtomicU32,
    }

    #[async_trait]
    impl Connector for SharedConnector {
        async fn connect(&self) -> Result<Arc<dyn DatabricksApi>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let api: Arc<dyn DatabricksApi> = self.api.clone();
            Ok(api)
        }
    }

    fn succeeded_run() -> JobRun {
        JobRun {
            job_id: 0,
            run_id: 0,
            state: RunState {
                life_cycle_state: LifeCycleState::Terminated,
                result_state: Some(ResultState::Success),
                state_message: None,
            },
            tasks: vec![RunTask {
                task_key: "run".into(),
                start_time: Some(1_700_000_000_000),
                end_time: Some(1_700_000_090_000),
                state: None,
            }],
            start_time: Some(1_700_000_000_000),
            end_time: Some(1_700_000_095_000),
        }
    }

    fn workspace(with_dlt_job: bool) -> FakeDatabricks {
        FakeDatabricks::default().with(|s| {
            s.jobs.insert(
                10,
                json!({"tasks": [{}, {"python_wheel_task": {"parameters": ["", ""]}}]}),
            );
            if with_dlt_job {
                s.jobs.insert(20, json!({"tasks": [{"pipeline_task": {}}]}));
            }
            s.pipelines.insert(
                "tmpl".into(),
                json!({"spec": {"clusters": [{"autoscale": {"min_workers": 1, "max_workers": 1}}]}}),
            );
            s.cluster = json!({"cluster_id": "0101-abc", "state": "RUNNING"});
            s.update_script = vec![PipelineUpdateState::Completed].into();
            s.run_script = vec![succeeded_run()].into();
        })
    }

    async fn seeded_db() -> BenchmarkDb {
        let db = BenchmarkDb::open_memory().await.unwrap();
        db.apply_plan(&BenchmarkPlan::from_yaml_str(PLAN).unwrap()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_both_lineages_complete_and_log() {
        let db = seeded_db().await;
        let api = Arc::new(workspace(true));
        let connector = Arc::new(SharedConnector {
            api: api.clone(),
            connects: AtomicU32::new(0),
        });

        let summary = run_benchmark(db.clone(), connector.clone(), "full_load", BenchmarkOptions::fast()).await;
        assert!(summary.succeeded(), "{}", summary.message());
        assert!(summary.message().starts_with("Benchmark 'full_load' finished."));

        let (dbt, dlt) = summary.into_result().unwrap();
        assert_eq!((dbt.configs, dbt.runs.len()), (1, 2));
        assert_eq!((dlt.configs, dlt.runs.len()), (1, 2));
        assert!(dbt.runs.iter().all(|r| r.status == RunStatus::Success && r.duration_seconds == 90));

        // One connection per run.
        assert_eq!(connector.connects.load(Ordering::SeqCst), 4);
        assert_eq!(api.state().run_now.len(), 4);

        // Nothing left to do on a second pass.
        assert!(db.pending_run_configs(RunType::Dbt, "full_load").await.unwrap().is_empty());
        assert!(db.pending_run_configs(RunType::Dlt, "full_load").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_lineage_does_not_stop_the_other() {
        let db = seeded_db().await;
        let connector = Arc::new(SharedConnector {
            api: Arc::new(workspace(false)),
            connects: AtomicU32::new(0),
        });

        let summary = run_benchmark(db.clone(), connector, "full_load", BenchmarkOptions::fast()).await;
        assert!(!summary.succeeded());
        assert_eq!(summary.dbt.as_ref().unwrap().runs.len(), 2);
        assert!(summary.dlt.is_err());
        assert!(summary.message().contains("DLT: failed"));

        let err = summary.into_result().unwrap_err();
        assert!(err.to_string().starts_with("Benchmark failed: DLT:"));
    }
}
