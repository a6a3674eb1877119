//! Trigger a job and follow it to its outcome.

use crate::client::JobsApi;
use crate::error::Result;
use crate::poll::{wait_for_job_run, PollPolicy, RunLogSink, TIMED_TASK_KEY};
use dbxops_protocol::jobs::{QueueSettings, RunNowRequest};
use dbxops_protocol::{JobRunHandle, RunLog};
use tracing::info;

/// Start a run of `job_id`. With `queue` the run waits behind an active one
/// instead of being skipped.
pub async fn trigger<J>(api: &J, job_id: i64, queue: bool) -> Result<JobRunHandle>
where
    J: JobsApi + ?Sized,
{
    let request = RunNowRequest {
        job_id,
        queue: queue.then_some(QueueSettings { enabled: true }),
    };
    let run_id = api.run_now(&request).await?;
    Ok(JobRunHandle { run_id, job_id })
}

/// Run one benchmark iteration of `job_id` and log its outcome for `config_id`.
pub async fn execute_run<J>(
    api: &J,
    config_id: i64,
    job_id: i64,
    policy: PollPolicy,
    sink: &dyn RunLogSink,
) -> Result<RunLog>
where
    J: JobsApi + ?Sized,
{
    let handle = trigger(api, job_id, false).await?;
    info!("Started job '{}' and got run id '{}'", job_id, handle.run_id);
    wait_for_job_run(api, handle, config_id, TIMED_TASK_KEY, policy, sink).await
}
