//! Benchmark run configuration and run log records.

use crate::ProtocolError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which half of the benchmark a configuration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunType {
    Dbt,
    Dlt,
}

impl RunType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Dbt => "DBT",
            RunType::Dlt => "DLT",
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DBT" => Ok(RunType::Dbt),
            "DLT" => Ok(RunType::Dlt),
            _ => Err(ProtocolError::InvalidRunType(s.to_string())),
        }
    }
}

/// Outcome recorded in the run log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Success,
    Failed,
    Timeout,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Failed => "FAILED",
            RunStatus::Timeout => "TIMEOUT",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(RunStatus::Success),
            "FAILED" => Ok(RunStatus::Failed),
            "TIMEOUT" => Ok(RunStatus::Timeout),
            _ => Err(ProtocolError::InvalidRunStatus(s.to_string())),
        }
    }
}

/// Sizing of a dbt configuration: an all-purpose cluster drives dbt, a SQL
/// warehouse executes the models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbtSizing {
    pub job_cluster_id: String,
    pub sql_warehouse_id: String,
    pub sql_serverless: bool,
    pub sql_cluster_size: String,
}

impl DbtSizing {
    /// `x-small__serverless` / `large__server-based`
    pub fn label(&self) -> String {
        format!(
            "{}__{}",
            self.sql_cluster_size.to_lowercase(),
            if self.sql_serverless { "serverless" } else { "server-based" }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DltSizing {
    pub pipeline_id: String,
    pub nr_of_workers: u32,
    pub photon: bool,
}

impl DltSizing {
    /// `3_workers__photon` / `3_workers__no_photon`
    pub fn label(&self) -> String {
        format!(
            "{}_workers__{}",
            self.nr_of_workers,
            if self.photon { "photon" } else { "no_photon" }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Sizing {
    Dbt(DbtSizing),
    Dlt(DltSizing),
}

impl Sizing {
    pub fn run_type(&self) -> RunType {
        match self {
            Sizing::Dbt(_) => RunType::Dbt,
            Sizing::Dlt(_) => RunType::Dlt,
        }
    }

    /// Human readable configuration used in reports.
    pub fn describe(&self) -> String {
        match self {
            Sizing::Dbt(s) => format!(
                "{} ({})",
                s.sql_cluster_size.to_lowercase(),
                if s.sql_serverless { "serverless" } else { "server-based" }
            ),
            Sizing::Dlt(s) => format!(
                "{} worker(s) ({})",
                s.nr_of_workers,
                if s.photon { "photon" } else { "no photon" }
            ),
        }
    }
}

/// One benchmark configuration together with its pending run count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub id: i64,
    pub use_case: String,
    pub job_id: i64,
    pub nr_of_runs: u32,
    /// `nr_of_runs` minus the SUCCESS rows already logged.
    pub remaining_runs: u32,
    pub incremental: bool,
    pub sizing: Sizing,
}

impl RunConfig {
    pub fn run_type(&self) -> RunType {
        self.sizing.run_type()
    }

    /// Run numbers still to execute, counting from where the log left off.
    pub fn pending_run_numbers(&self) -> std::ops::RangeInclusive<u32> {
        let remaining = self.remaining_runs.min(self.nr_of_runs);
        (self.nr_of_runs - remaining + 1)..=self.nr_of_runs
    }
}

/// One row of the append-only run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLog {
    pub config_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
    pub status: RunStatus,
}

impl RunLog {
    /// Build a row from an epoch-millisecond window.
    pub fn from_millis(config_id: i64, start_ms: i64, end_ms: i64, status: RunStatus) -> Self {
        let start_time = millis_to_utc(start_ms);
        let end_time = millis_to_utc(end_ms.max(start_ms));
        let duration_seconds = (end_time - start_time).num_seconds();
        Self {
            config_id,
            start_time,
            end_time,
            duration_seconds,
            status,
        }
    }

    /// A zero-length row at `at`, for runs that never reported timestamps.
    pub fn instant(config_id: i64, at: DateTime<Utc>, status: RunStatus) -> Self {
        Self {
            config_id,
            start_time: at,
            end_time: at,
            duration_seconds: 0,
            status,
        }
    }
}

fn millis_to_utc(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// A triggered job run. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobRunHandle {
    pub run_id: i64,
    pub job_id: i64,
}
