//! Run configuration queries and the append-only run log.

use crate::error::{DbError, Result};
use crate::BenchmarkDb;
use chrono::{DateTime, Utc};
use dbxops_protocol::{DbtSizing, DltSizing, RunConfig, RunLog, RunStatus, RunType, Sizing};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;
use tracing::debug;

/// Average SUCCESS duration of one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigAverage {
    pub config_id: i64,
    pub use_case: String,
    pub sizing: Sizing,
    pub successful_runs: i64,
    pub avg_duration_seconds: f64,
}

const CONFIG_SELECT: &str = r#"
    SELECT cfg.*, uc.use_case,
           cfg.nr_of_runs - COALESCE(cnt.runs, 0) AS remaining_runs
    FROM benchmark_run_config AS cfg
        INNER JOIN benchmark_use_case AS uc ON cfg.use_case_id = uc.id
        LEFT OUTER JOIN (
            SELECT benchmark_run_config_id, COUNT(*) AS runs
            FROM benchmark_run_log
            WHERE status = 'SUCCESS'
            GROUP BY benchmark_run_config_id
        ) AS cnt ON cfg.id = cnt.benchmark_run_config_id
"#;

impl BenchmarkDb {
    /// Configurations of one lineage with SUCCESS runs still missing.
    ///
    /// `remaining_runs` is recomputed from the log on every call, so a
    /// restarted benchmark continues where the previous one stopped.
    pub async fn pending_run_configs(&self, run_type: RunType, use_case: &str) -> Result<Vec<RunConfig>> {
        let sql = format!(
            "{} WHERE cfg.run_type = ? AND uc.use_case = ? AND COALESCE(cnt.runs, 0) < cfg.nr_of_runs ORDER BY cfg.id",
            CONFIG_SELECT
        );
        let rows = sqlx::query(&sql)
            .bind(run_type.as_str())
            .bind(use_case)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_run_config).collect()
    }

    /// Append one outcome. Rows are never updated or deleted.
    pub async fn append_run_log(&self, log: &RunLog) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO benchmark_run_log (benchmark_run_config_id, start_time, end_time, duration, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.config_id)
        .bind(log.start_time.timestamp_millis())
        .bind(log.end_time.timestamp_millis())
        .bind(log.duration_seconds)
        .bind(log.status.as_str())
        .execute(&self.pool)
        .await?;

        debug!(
            config_id = log.config_id,
            status = %log.status,
            duration = log.duration_seconds,
            "Run logged"
        );
        Ok(result.last_insert_rowid())
    }

    /// Log rows of one configuration, oldest first.
    pub async fn run_logs(&self, config_id: i64) -> Result<Vec<RunLog>> {
        let rows = sqlx::query(
            r#"
            SELECT benchmark_run_config_id, start_time, end_time, duration, status
            FROM benchmark_run_log
            WHERE benchmark_run_config_id = ?
            ORDER BY start_time, id
            "#,
        )
        .bind(config_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_run_log).collect()
    }

    /// Average SUCCESS durations per configuration, optionally for one use case.
    pub async fn average_durations(&self, use_case: Option<&str>) -> Result<Vec<ConfigAverage>> {
        let rows = sqlx::query(
            r#"
            SELECT cfg.*, uc.use_case,
                   0 AS remaining_runs,
                   COUNT(log.id) AS successful_runs,
                   AVG(log.duration * 1.0) AS avg_duration
            FROM benchmark_run_log AS log
                INNER JOIN benchmark_run_config AS cfg ON log.benchmark_run_config_id = cfg.id
                INNER JOIN benchmark_use_case AS uc ON cfg.use_case_id = uc.id
            WHERE log.status = 'SUCCESS' AND (? IS NULL OR uc.use_case = ?)
            GROUP BY cfg.id
            ORDER BY uc.use_case, cfg.run_type, cfg.id
            "#,
        )
        .bind(use_case)
        .bind(use_case)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let config = row_to_run_config(row)?;
                Ok(ConfigAverage {
                    config_id: config.id,
                    use_case: config.use_case,
                    sizing: config.sizing,
                    successful_runs: row.get("successful_runs"),
                    avg_duration_seconds: row.get("avg_duration"),
                })
            })
            .collect()
    }
}

fn required<T>(value: Option<T>, id: i64, column: &str) -> Result<T> {
    value.ok_or_else(|| DbError::corrupt(format!("run config {} has no {}", id, column)))
}

fn row_to_run_config(row: &SqliteRow) -> Result<RunConfig> {
    let id: i64 = row.get("id");
    let run_type_str: String = row.get("run_type");
    let run_type = RunType::from_str(&run_type_str).map_err(|e| DbError::corrupt(e.to_string()))?;

    let sizing = match run_type {
        RunType::Dbt => Sizing::Dbt(DbtSizing {
            job_cluster_id: required(row.get("dbt_job_cluster"), id, "dbt_job_cluster")?,
            sql_warehouse_id: required(row.get("dbt_sql_warehouse_id"), id, "dbt_sql_warehouse_id")?,
            sql_serverless: required(row.get("dbt_sql_serverless"), id, "dbt_sql_serverless")?,
            sql_cluster_size: required(row.get("dbt_sql_cluster_size"), id, "dbt_sql_cluster_size")?,
        }),
        RunType::Dlt => Sizing::Dlt(DltSizing {
            pipeline_id: required(row.get("dlt_pipeline_id"), id, "dlt_pipeline_id")?,
            nr_of_workers: required(row.get("dlt_nr_of_workers"), id, "dlt_nr_of_workers")?,
            photon: required(row.get("dlt_photon"), id, "dlt_photon")?,
        }),
    };

    let nr_of_runs: u32 = row.get("nr_of_runs");
    let remaining: i64 = row.get("remaining_runs");

    Ok(RunConfig {
        id,
        use_case: row.get("use_case"),
        job_id: row.get("job_id"),
        nr_of_runs,
        remaining_runs: remaining.clamp(0, i64::from(nr_of_runs)) as u32,
        incremental: row.get("incremental"),
        sizing,
    })
}

fn row_to_run_log(row: &SqliteRow) -> Result<RunLog> {
    let status_str: String = row.get("status");
    let status = RunStatus::from_str(&status_str).map_err(|e| DbError::corrupt(e.to_string()))?;
    let start_ms: i64 = row.get("start_time");
    let end_ms: i64 = row.get("end_time");

    Ok(RunLog {
        config_id: row.get("benchmark_run_config_id"),
        start_time: millis_to_utc(start_ms)?,
        end_time: millis_to_utc(end_ms)?,
        duration_seconds: row.get("duration"),
        status,
    })
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| DbError::corrupt(format!("timestamp {} out of range", ms)))
}
