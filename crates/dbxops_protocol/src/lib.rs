//! Wire model for the Databricks REST surface used by dbxops.
//!
//! Everything here is plain serde data. The HTTP client lives in the `dbxops`
//! crate; credentials live in `dbxops_security`.
//!
//! Field names mirror the REST payloads exactly (`object_type`, `path`,
//! `content`, `overwrite`, `job_id`, `run_id`, ...) so the structs can be
//! posted and parsed without renaming.

pub mod benchmark;
pub mod host;
pub mod jobs;
pub mod pipelines;
pub mod warehouses;
pub mod workspace;

pub use benchmark::{DbtSizing, DltSizing, JobRunHandle, RunConfig, RunLog, RunStatus, RunType, Sizing};
pub use host::{normalize_host, CloudPlatform};
pub use jobs::{JobRun, LifeCycleState, ResultState, RunNowResponse, RunState, RunTask};
pub use pipelines::PipelineUpdateState;
pub use warehouses::WarehouseState;
pub use workspace::{ImportFormat, ImportRequest, ObjectType, WorkspaceObject};

use thiserror::Error;

/// Errors raised while interpreting protocol values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid run type: '{0}'. Expected: DBT or DLT")]
    InvalidRunType(String),

    #[error("Invalid run status: '{0}'. Expected: SUCCESS, FAILED or TIMEOUT")]
    InvalidRunStatus(String),

    #[error("Task '{task_key}' not found in run {run_id}")]
    TaskNotFound { run_id: i64, task_key: String },

    #[error("Run {run_id} has no start time for task '{task_key}'")]
    MissingTimestamp { run_id: i64, task_key: String },
}
