//! Table creation. All CREATE TABLE statements live here.

use crate::error::Result;
use crate::BenchmarkDb;
use tracing::debug;

impl BenchmarkDb {
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS benchmark_use_case (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                use_case TEXT NOT NULL UNIQUE,
                description TEXT,
                incremental INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS benchmark_run_config (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                use_case_id INTEGER NOT NULL REFERENCES benchmark_use_case(id),
                run_type TEXT NOT NULL CHECK (run_type IN ('DBT', 'DLT')),
                nr_of_runs INTEGER NOT NULL,
                incremental INTEGER NOT NULL DEFAULT 0,
                job_id INTEGER NOT NULL,
                dbt_job_cluster TEXT,
                dbt_sql_warehouse_id TEXT,
                dbt_sql_serverless INTEGER,
                dbt_sql_cluster_size TEXT,
                dlt_pipeline_id TEXT,
                dlt_nr_of_workers INTEGER,
                dlt_photon INTEGER
            )"#,
        )
        .execute(&self.pool)
        .await?;

        // Times are epoch milliseconds; duration is whole seconds.
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS benchmark_run_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                benchmark_run_config_id INTEGER NOT NULL REFERENCES benchmark_run_config(id),
                start_time INTEGER NOT NULL,
                end_time INTEGER NOT NULL,
                duration INTEGER NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('SUCCESS', 'FAILED', 'TIMEOUT'))
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_run_config_use_case ON benchmark_run_config(use_case_id, run_type)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_run_log_config ON benchmark_run_log(benchmark_run_config_id, status)",
        )
        .execute(&self.pool)
        .await?;

        debug!("Benchmark schema verified");
        Ok(())
    }
}
