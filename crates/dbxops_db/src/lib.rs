//! Benchmark store for dbxops
//!
//! Three tables back the dbt-vs-DLT benchmark:
//!
//! - `benchmark_use_case`: what is being measured (full load, incremental, ...)
//! - `benchmark_run_config`: every sizing to run per use case, and how often
//! - `benchmark_run_log`: append-only outcome of every run
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbxops_db::{BenchmarkDb, Result};
//! use dbxops_protocol::RunType;
//!
//! let db = BenchmarkDb::open("~/.dbxops/benchmark.sqlite3").await?;
//! let pending = db.pending_run_configs(RunType::Dbt, "full_load_80m_rows").await?;
//! ```

mod error;
mod schema;

mod plan;
mod runs;

pub use error::{DbError, Result};
pub use plan::{BenchmarkPlan, DbtPlan, DltPlan, SetupSummary, SizeDimension, UseCasePlan, WorkerDimension};
pub use runs::ConfigAverage;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use tracing::info;

/// File name of the store under the dbxops home directory.
pub const DEFAULT_DB_FILE: &str = "benchmark.sqlite3";

/// Handle on the benchmark store. Cheap to clone; both benchmark lineages
/// share one.
#[derive(Clone)]
pub struct BenchmarkDb {
    pool: SqlitePool,
}

impl BenchmarkDb {
    /// Open or create a store at the given path.
    ///
    /// Creates all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Both lineages append to the run log concurrently.
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;

        info!(path = %path.display(), "Benchmark store opened");

        Ok(db)
    }

    /// In-memory store with a single connection, for tests.
    pub async fn open_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
