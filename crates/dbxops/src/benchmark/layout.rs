//! Edits to the task array of the benchmark jobs.
//!
//! The benchmark jobs are defined outside this tool and addressed by task
//! position. Version 1 of that layout is:
//!
//! - DBT job: `tasks[0]` prepares, `tasks[1]` is a python wheel task whose
//!   first two parameters are the dbt command and the `--vars` argument.
//!   Both tasks run on the benchmark cluster.
//! - DLT job: `tasks[0]` is a pipeline task.
//!
//! Every position is checked before anything is mutated.

use crate::error::{Error, Result};
use serde_json::Value;

pub const JOB_LAYOUT_VERSION: u32 = 1;

fn mismatch(job_id: i64, reason: impl Into<String>) -> Error {
    Error::JobLayout {
        job_id,
        layout_version: JOB_LAYOUT_VERSION,
        reason: reason.into(),
    }
}

fn tasks_of(job_id: i64, settings: &Value, min_len: usize) -> Result<Vec<Value>> {
    let tasks = settings
        .get("tasks")
        .and_then(Value::as_array)
        .ok_or_else(|| mismatch(job_id, "settings have no tasks array"))?;
    if tasks.len() < min_len {
        return Err(mismatch(
            job_id,
            format!("expected at least {} tasks, found {}", min_len, tasks.len()),
        ));
    }
    if let Some(i) = tasks.iter().position(|t| !t.is_object()) {
        return Err(mismatch(job_id, format!("tasks[{}] is not an object", i)));
    }
    Ok(tasks.clone())
}

/// Return the DBT job's tasks with the cluster, dbt command and vars set.
pub fn dbt_tasks(
    job_id: i64,
    settings: &Value,
    cluster_id: &str,
    dbt_command: &str,
    dbt_vars: &str,
) -> Result<Vec<Value>> {
    let mut tasks = tasks_of(job_id, settings, 2)?;

    let parameters = tasks[1]
        .get("python_wheel_task")
        .and_then(|w| w.get("parameters"))
        .and_then(Value::as_array)
        .ok_or_else(|| mismatch(job_id, "tasks[1] is not a python wheel task with parameters"))?;
    if parameters.len() < 2 {
        return Err(mismatch(
            job_id,
            format!("tasks[1] has {} wheel parameter(s), expected 2", parameters.len()),
        ));
    }

    let params = &mut tasks[1]["python_wheel_task"]["parameters"];
    params[0] = Value::from(dbt_command);
    params[1] = Value::from(dbt_vars);
    tasks[0]["existing_cluster_id"] = Value::from(cluster_id);
    tasks[1]["existing_cluster_id"] = Value::from(cluster_id);
    Ok(tasks)
}

/// Return the DLT job's tasks pointing at `pipeline_id`.
pub fn dlt_tasks(job_id: i64, settings: &Value, pipeline_id: &str, full_refresh: bool) -> Result<Vec<Value>> {
    let mut tasks = tasks_of(job_id, settings, 1)?;
    if !tasks[0].get("pipeline_task").is_some_and(Value::is_object) {
        return Err(mismatch(job_id, "tasks[0] is not a pipeline task"));
    }

    let task = &mut tasks[0]["pipeline_task"];
    task["pipeline_id"] = Value::from(pipeline_id);
    task["full_refresh"] = Value::from(full_refresh);
    Ok(tasks)
}
