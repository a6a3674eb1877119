//! Fixed-interval polling of job runs, pipeline updates and SQL warehouses.
//!
//! Every wait has a poll budget and no other ceiling. Nothing is cancelled
//! remotely when a budget runs out; the caller gets [`Error::Timeout`].

use crate::client::{ComputeApi, JobsApi, PipelinesApi};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use dbxops_db::BenchmarkDb;
use dbxops_protocol::{
    JobRun, JobRunHandle, PipelineUpdateState, RunLog, RunStatus, WarehouseState,
};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Task whose timestamps measure a benchmark run.
pub const TIMED_TASK_KEY: &str = "run";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl PollPolicy {
    /// 300 polls at 30 s, two and a half hours.
    pub const JOB_RUN: PollPolicy = PollPolicy::new(Duration::from_secs(30), 300);
    /// 30 polls at 30 s.
    pub const PIPELINE_UPDATE: PollPolicy = PollPolicy::new(Duration::from_secs(30), 30);

    pub const fn new(interval: Duration, max_polls: u32) -> Self {
        Self { interval, max_polls }
    }

    /// Serverless warehouses start in seconds, classic ones in minutes.
    pub const fn warehouse(serverless: bool) -> Self {
        let secs = if serverless { 3 } else { 30 };
        Self::new(Duration::from_secs(secs), 30)
    }

    /// Sleep before the next poll. Nothing is left to wait for after the
    /// last one.
    async fn pause(&self, attempt: u32) {
        if attempt < self.max_polls {
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Where run outcomes are recorded.
#[async_trait]
pub trait RunLogSink: Send + Sync {
    async fn append(&self, log: &RunLog) -> Result<()>;
}

#[async_trait]
impl RunLogSink for BenchmarkDb {
    async fn append(&self, log: &RunLog) -> Result<()> {
        self.append_run_log(log).await?;
        Ok(())
    }
}

/// Poll a job run until it terminates and record exactly one outcome row.
///
/// - `TERMINATED`/`SUCCESS`: a SUCCESS row timed by `task_key`.
/// - any other terminal state: a FAILED row, then [`Error::RunFailed`].
/// - budget exhausted: a TIMEOUT row, then [`Error::Timeout`].
pub async fn wait_for_job_run<J>(
    api: &J,
    handle: JobRunHandle,
    config_id: i64,
    task_key: &str,
    policy: PollPolicy,
    sink: &dyn RunLogSink,
) -> Result<RunLog>
where
    J: JobsApi + ?Sized,
{
    let started = Instant::now();

    for attempt in 1..=policy.max_polls {
        let run = api.get_run(handle.run_id).await?;
        let state = &run.state;

        if state.life_cycle_state.is_in_progress() {
            info!(
                run_id = handle.run_id,
                state = %state.life_cycle_state,
                "Job still running. Going to sleep. ({}/{})",
                attempt,
                policy.max_polls
            );
            policy.pause(attempt).await;
            continue;
        }

        if state.is_success() {
            let log = outcome_log(&run, config_id, task_key, RunStatus::Success);
            sink.append(&log).await?;
            info!(
                job_id = handle.job_id,
                run_id = handle.run_id,
                "Run with config id {} finished in {} seconds",
                config_id,
                log.duration_seconds
            );
            return Ok(log);
        }

        let log = outcome_log(&run, config_id, task_key, RunStatus::Failed);
        sink.append(&log).await?;
        return Err(Error::RunFailed {
            run_id: handle.run_id,
            life_cycle_state: state.life_cycle_state.to_string(),
            result_state: state
                .result_state
                .map(|r| r.to_string())
                .unwrap_or_else(|| "NONE".to_string()),
            message: state.state_message.clone().unwrap_or_default(),
        });
    }

    warn!(run_id = handle.run_id, config_id, "Job run did not finish in time");
    sink.append(&RunLog::instant(config_id, Utc::now(), RunStatus::Timeout))
        .await?;
    Err(Error::Timeout {
        what: format!("job run {} (config {})", handle.run_id, config_id),
        attempts: policy.max_polls,
        elapsed: started.elapsed(),
    })
}

/// Time the outcome by `task_key`, else by the whole run, else as an instant.
fn outcome_log(run: &JobRun, config_id: i64, task_key: &str, status: RunStatus) -> RunLog {
    let window = match run.task_window(task_key) {
        Ok(window) => Some(window),
        Err(e) => {
            warn!(run_id = run.run_id, error = %e, "Timing the run as a whole");
            run.run_window()
        }
    };
    match window {
        Some((start, end)) => RunLog::from_millis(config_id, start, end, status),
        None => RunLog::instant(config_id, Utc::now(), status),
    }
}

/// Poll a validate-only pipeline update until it completes.
pub async fn wait_for_pipeline_update<P>(
    api: &P,
    pipeline_id: &str,
    update_id: &str,
    policy: PollPolicy,
) -> Result<()>
where
    P: PipelinesApi + ?Sized,
{
    let started = Instant::now();

    for attempt in 1..=policy.max_polls {
        let state = api.get_update(pipeline_id, update_id).await?;
        if state.is_validation_in_progress() {
            info!(
                pipeline_id,
                "Pipeline in state '{}'. Going to sleep. ({}/{})",
                state,
                attempt,
                policy.max_polls
            );
            policy.pause(attempt).await;
            continue;
        }
        if state == PipelineUpdateState::Completed {
            info!(pipeline_id, "Pipeline ready");
            return Ok(());
        }
        return Err(Error::PipelineFailed {
            pipeline_id: pipeline_id.to_string(),
            update_id: update_id.to_string(),
            state: state.to_string(),
        });
    }

    Err(Error::Timeout {
        what: format!("pipeline {} update {}", pipeline_id, update_id),
        attempts: policy.max_polls,
        elapsed: started.elapsed(),
    })
}

/// Poll a SQL warehouse until it runs, starting it when it is stopped.
pub async fn wait_for_warehouse<C>(api: &C, warehouse_id: &str, policy: PollPolicy) -> Result<()>
where
    C: ComputeApi + ?Sized,
{
    let started = Instant::now();

    for attempt in 1..=policy.max_polls {
        let warehouse = api.get_warehouse(warehouse_id).await?;
        match warehouse.state {
            WarehouseState::Running => {
                info!(warehouse_id, "Warehouse ready");
                return Ok(());
            }
            WarehouseState::Starting => {
                info!(
                    warehouse_id,
                    "Warehouse still starting. Going to sleep. ({}/{})",
                    attempt,
                    policy.max_polls
                );
            }
            WarehouseState::Stopped => {
                info!(
                    warehouse_id,
                    "Warehouse is stopped. Restarting and going to sleep. ({}/{})",
                    attempt,
                    policy.max_polls
                );
                api.start_warehouse(warehouse_id).await?;
            }
            other => {
                return Err(Error::WarehouseFailed {
                    warehouse_id: warehouse_id.to_string(),
                    state: other.to_string(),
                })
            }
        }
        policy.pause(attempt).await;
    }

    Err(Error::Timeout {
        what: format!("SQL warehouse {}", warehouse_id),
        attempts: policy.max_polls,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDatabricks, MemoryRunLog};
    use dbxops_protocol::{LifeCycleState, ResultState, RunState, RunTask};

    const FAST: PollPolicy = PollPolicy::new(Duration::from_millis(1), 5);

    fn run(life_cycle: LifeCycleState, result: Option<ResultState>) -> JobRun {
        JobRun {
            job_id: 11,
            run_id: 42,
            state: RunState {
                life_cycle_state: life_cycle,
                result_state: result,
                state_message: Some("msg".into()),
            },
            tasks: vec![
                RunTask {
                    task_key: "debug".into(),
                    start_time: Some(1_000),
                    end_time: Some(60_000),
                    state: None,
                },
                RunTask {
                    task_key: "run".into(),
                    start_time: Some(61_000),
                    end_time: Some(181_000),
                    state: None,
                },
            ],
            start_time: Some(1_000),
            end_time: Some(181_000),
        }
    }

    const HANDLE: JobRunHandle = JobRunHandle { run_id: 42, job_id: 11 };

    #[tokio::test]
    async fn test_success_logs_task_duration() {
        let api = FakeDatabricks::default().with(|s| {
            s.run_script = vec![
                run(LifeCycleState::Pending, None),
                run(LifeCycleState::Running, None),
                run(LifeCycleState::Terminated, Some(ResultState::Success)),
            ]
            .into();
        });
        let sink = MemoryRunLog::default();

        let log = wait_for_job_run(&api, HANDLE, 7, TIMED_TASK_KEY, FAST, &sink).await.unwrap();
        assert_eq!(log.duration_seconds, 120);
        assert_eq!(log.status, RunStatus::Success);
        assert_eq!(sink.logs(), vec![log]);
        assert_eq!(api.state().get_run_calls, 3);
    }

    #[tokio::test]
    async fn test_success_without_timed_task_uses_run_window() {
        let mut finished = run(LifeCycleState::Terminated, Some(ResultState::Success));
        finished.tasks.retain(|t| t.task_key != TIMED_TASK_KEY);
        let api = FakeDatabricks::default().with(|s| {
            s.run_script = vec![finished].into();
        });
        let sink = MemoryRunLog::default();

        let log = wait_for_job_run(&api, HANDLE, 7, TIMED_TASK_KEY, FAST, &sink).await.unwrap();
        assert_eq!(log.status, RunStatus::Success);
        assert_eq!(log.duration_seconds, 180);
        assert_eq!(sink.logs(), vec![log]);
    }

    #[tokio::test]
    async fn test_last_poll_does_not_sleep() {
        let slow = PollPolicy::new(Duration::from_secs(3600), 1);
        let api = FakeDatabricks::default().with(|s| {
            s.run_script = vec![run(LifeCycleState::Running, None)].into();
            s.update_script = vec![PipelineUpdateState::Queued].into();
            s.warehouse_script = vec![WarehouseState::Starting].into();
        });
        let sink = MemoryRunLog::default();
        let budget = Duration::from_secs(5);

        let job = tokio::time::timeout(
            budget,
            wait_for_job_run(&api, HANDLE, 7, TIMED_TASK_KEY, slow, &sink),
        )
        .await
        .expect("job wait slept after its last poll");
        assert!(job.unwrap_err().is_timeout());

        let pipeline = tokio::time::timeout(budget, wait_for_pipeline_update(&api, "p1", "u1", slow))
            .await
            .expect("pipeline wait slept after its last poll");
        assert!(pipeline.unwrap_err().is_timeout());

        let warehouse = tokio::time::timeout(budget, wait_for_warehouse(&api, "wh1", slow))
            .await
            .expect("warehouse wait slept after its last poll");
        assert!(warehouse.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_failed_run_logs_then_errors() {
        let api = FakeDatabricks::default().with(|s| {
            s.run_script = vec![run(LifeCycleState::Terminated, Some(ResultState::Failed))].into();
        });
        let sink = MemoryRunLog::default();

        let err = wait_for_job_run(&api, HANDLE, 7, TIMED_TASK_KEY, FAST, &sink)
            .await
            .unwrap_err();
        match err {
            Error::RunFailed { run_id, result_state, .. } => {
                assert_eq!(run_id, 42);
                assert_eq!(result_state, "FAILED");
            }
            other => panic!("unexpected error {other:?}"),
        }
        let logs = sink.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, RunStatus::Failed);
        assert_eq!(logs[0].duration_seconds, 120);
    }

    #[tokio::test]
    async fn test_internal_error_counts_as_failure() {
        let api = FakeDatabricks::default().with(|s| {
            s.run_script = vec![run(LifeCycleState::InternalError, None)].into();
        });
        let sink = MemoryRunLog::default();
        let err = wait_for_job_run(&api, HANDLE, 7, TIMED_TASK_KEY, FAST, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RunFailed { .. }));
        assert_eq!(sink.logs()[0].status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_exhausted_budget_logs_timeout() {
        let api = FakeDatabricks::default().with(|s| {
            s.run_script = vec![run(LifeCycleState::Running, None)].into();
        });
        let sink = MemoryRunLog::default();

        let err = wait_for_job_run(&api, HANDLE, 7, TIMED_TASK_KEY, FAST, &sink)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(api.state().get_run_calls, 5);
        let logs = sink.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, RunStatus::Timeout);
    }

    #[tokio::test]
    async fn test_pipeline_ready_on_third_poll() {
        let api = FakeDatabricks::default().with(|s| {
            s.update_script = vec![
                PipelineUpdateState::Queued,
                PipelineUpdateState::Initializing,
                PipelineUpdateState::Completed,
            ]
            .into();
        });
        wait_for_pipeline_update(&api, "p1", "u1", FAST).await.unwrap();
        assert_eq!(api.state().get_update_calls, 3);
    }

    #[tokio::test]
    async fn test_pipeline_unexpected_state() {
        let api = FakeDatabricks::default().with(|s| {
            s.update_script = vec![PipelineUpdateState::Created, PipelineUpdateState::Running].into();
        });
        let err = wait_for_pipeline_update(&api, "p1", "u1", FAST).await.unwrap_err();
        assert!(matches!(err, Error::PipelineFailed { ref state, .. } if state == "RUNNING"));
    }

    #[tokio::test]
    async fn test_pipeline_timeout() {
        let api = FakeDatabricks::default().with(|s| {
            s.update_script = vec![PipelineUpdateState::WaitingForResources].into();
        });
        let err = wait_for_pipeline_update(&api, "p1", "u1", FAST).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_stopped_warehouse_is_started() {
        let api = FakeDatabricks::default().with(|s| {
            s.warehouse_script = vec![
                WarehouseState::Stopped,
                WarehouseState::Starting,
                WarehouseState::Running,
            ]
            .into();
        });
        wait_for_warehouse(&api, "wh1", FAST).await.unwrap();
        assert_eq!(api.state().warehouse_starts, 1);
    }

    #[tokio::test]
    async fn test_deleted_warehouse_fails() {
        let api = FakeDatabricks::default().with(|s| {
            s.warehouse_script = vec![WarehouseState::Deleted].into();
        });
        let err = wait_for_warehouse(&api, "wh1", FAST).await.unwrap_err();
        assert!(matches!(err, Error::WarehouseFailed { .. }));
    }

    #[test]
    fn test_default_budgets() {
        assert_eq!(PollPolicy::JOB_RUN.max_polls, 300);
        assert_eq!(PollPolicy::warehouse(true).interval, Duration::from_secs(3));
        assert_eq!(PollPolicy::warehouse(false).interval, Duration::from_secs(30));
    }
}
