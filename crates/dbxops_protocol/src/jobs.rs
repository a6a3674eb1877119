//! Jobs API payloads (`/api/2.1/jobs/*`).

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Life-cycle state of a job run as reported by `runs/get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifeCycleState {
    Pending,
    Queued,
    Blocked,
    WaitingForRetry,
    Running,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
    #[serde(other)]
    Unknown,
}

impl LifeCycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifeCycleState::Pending => "PENDING",
            LifeCycleState::Queued => "QUEUED",
            LifeCycleState::Blocked => "BLOCKED",
            LifeCycleState::WaitingForRetry => "WAITING_FOR_RETRY",
            LifeCycleState::Running => "RUNNING",
            LifeCycleState::Terminating => "TERMINATING",
            LifeCycleState::Terminated => "TERMINATED",
            LifeCycleState::Skipped => "SKIPPED",
            LifeCycleState::InternalError => "INTERNAL_ERROR",
            LifeCycleState::Unknown => "UNKNOWN",
        }
    }

    /// The run has not reached a terminal state yet.
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            LifeCycleState::Pending
                | LifeCycleState::Queued
                | LifeCycleState::Blocked
                | LifeCycleState::WaitingForRetry
                | LifeCycleState::Running
                | LifeCycleState::Terminating
        )
    }
}

impl fmt::Display for LifeCycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultState {
    Success,
    SuccessWithFailures,
    Failed,
    Timedout,
    Canceled,
    MaximumConcurrentRunsReached,
    Excluded,
    UpstreamFailed,
    UpstreamCanceled,
    #[serde(other)]
    Unknown,
}

impl ResultState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultState::Success => "SUCCESS",
            ResultState::SuccessWithFailures => "SUCCESS_WITH_FAILURES",
            ResultState::Failed => "FAILED",
            ResultState::Timedout => "TIMEDOUT",
            ResultState::Canceled => "CANCELED",
            ResultState::MaximumConcurrentRunsReached => "MAXIMUM_CONCURRENT_RUNS_REACHED",
            ResultState::Excluded => "EXCLUDED",
            ResultState::UpstreamFailed => "UPSTREAM_FAILED",
            ResultState::UpstreamCanceled => "UPSTREAM_CANCELED",
            ResultState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub life_cycle_state: LifeCycleState,
    #[serde(default)]
    pub result_state: Option<ResultState>,
    #[serde(default)]
    pub state_message: Option<String>,
}

impl RunState {
    pub fn is_success(&self) -> bool {
        self.life_cycle_state == LifeCycleState::Terminated
            && self.result_state == Some(ResultState::Success)
    }
}

/// One task of a job run. Timestamps are epoch milliseconds; `end_time` is
/// zero while the task is still running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTask {
    pub task_key: String,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub state: Option<RunState>,
}

/// Response of `GET /api/2.1/jobs/runs/get`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    pub job_id: i64,
    pub run_id: i64,
    pub state: RunState,
    #[serde(default)]
    pub tasks: Vec<RunTask>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
}

impl JobRun {
    pub fn task(&self, task_key: &str) -> Option<&RunTask> {
        self.tasks.iter().find(|t| t.task_key == task_key)
    }

    /// Start and end (epoch millis) of the named task.
    ///
    /// A missing or zero end time collapses to the start time.
    pub fn task_window(&self, task_key: &str) -> Result<(i64, i64), ProtocolError> {
        let task = self.task(task_key).ok_or_else(|| ProtocolError::TaskNotFound {
            run_id: self.run_id,
            task_key: task_key.to_string(),
        })?;
        let start = task
            .start_time
            .filter(|t| *t > 0)
            .ok_or_else(|| ProtocolError::MissingTimestamp {
                run_id: self.run_id,
                task_key: task_key.to_string(),
            })?;
        let end = task.end_time.filter(|t| *t >= start).unwrap_or(start);
        Ok((start, end))
    }

    /// Start and end of the whole run, with the same end-time collapse as
    /// [`JobRun::task_window`]. `None` when the run has no start time.
    pub fn run_window(&self) -> Option<(i64, i64)> {
        let start = self.start_time.filter(|t| *t > 0)?;
        let end = self.end_time.filter(|t| *t >= start).unwrap_or(start);
        Some((start, end))
    }
}

/// Body of `POST /api/2.1/jobs/run-now`.
#[derive(Debug, Clone, Serialize)]
pub struct RunNowRequest {
    pub job_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueSettings>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RunNowResponse {
    pub run_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobSummary {
    pub job_id: i64,
}

/// Response of `GET /api/2.1/jobs/list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsListResponse {
    #[serde(default)]
    pub jobs: Option<Vec<JobSummary>>,
}

/// Response of `GET /api/2.1/jobs/get`. Settings stay untyped because they are
/// edited in place and posted back.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub job_id: i64,
    pub settings: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateJobRequest {
    pub job_id: i64,
    pub new_settings: serde_json::Value,
}
