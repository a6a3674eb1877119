//! dbxops - CI/CD and benchmark tooling for dbt projects on Databricks.
//!
//! Shared functionality behind the `dbxops` binary: wheel deployment and
//! retention, workflow triggers, and the dbt versus DLT benchmark.

pub mod actions;
pub mod benchmark;
pub mod cleanup;
pub mod client;
pub mod deploy;
pub mod error;
pub mod notify;
pub mod poll;
pub mod publish;
pub mod runner;
pub mod settings;
pub mod wheel;
pub mod workflows;

#[cfg(test)]
mod testing;

pub use client::{DatabricksApi, DatabricksClient};
pub use error::{Error, Result};
pub use poll::PollPolicy;
pub use settings::{DatabricksConnector, DatabricksSettings};
pub use wheel::{RetentionPolicy, WheelVersion};
