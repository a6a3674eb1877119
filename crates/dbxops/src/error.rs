//! Error type shared by the dbxops operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Non-2xx answer from the workspace API. The body was logged already.
    #[error("{method} {url} returned HTTP {status}: {body}")]
    Http {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error(transparent)]
    Auth(#[from] dbxops_security::AuthError),

    #[error(transparent)]
    Protocol(#[from] dbxops_protocol::ProtocolError),

    #[error(transparent)]
    Db(#[from] dbxops_db::DbError),

    #[error(transparent)]
    Schema(#[from] dbxops_schema::SchemaError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid workflow definition {path}: {source}")]
    Definition {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("'{file_name}' is not a wheel file name: {reason}")]
    InvalidWheelName { file_name: String, reason: String },

    #[error("Invalid wheel version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// A polled resource never reached a terminal state within its budget.
    #[error("Timed out waiting for {what} after {attempts} polls ({elapsed:?})")]
    Timeout {
        what: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("Job run {run_id} ended in {life_cycle_state}/{result_state}: {message}")]
    RunFailed {
        run_id: i64,
        life_cycle_state: String,
        result_state: String,
        message: String,
    },

    #[error("Pipeline {pipeline_id} update {update_id} ended in unexpected state {state}")]
    PipelineFailed {
        pipeline_id: String,
        update_id: String,
        state: String,
    },

    #[error("SQL warehouse {warehouse_id} is in unexpected state {state}")]
    WarehouseFailed { warehouse_id: String, state: String },

    /// Job settings do not have the task layout the benchmark edits.
    #[error("Job {job_id} does not match task layout v{layout_version}: {reason}")]
    JobLayout {
        job_id: i64,
        layout_version: u32,
        reason: String,
    },

    #[error("Failed to delete {} wheel(s): {}", .0.len(), .0.join(", "))]
    CleanupFailed(Vec<String>),

    #[error("Benchmark failed: {0}")]
    Benchmark(String),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub(crate) fn invalid_response(url: impl Into<String>, reason: impl ToString) -> Self {
        Error::InvalidResponse {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
