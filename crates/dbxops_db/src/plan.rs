//! Benchmark plan: the YAML description of use cases and sizing dimensions
//! that `benchmark setup` loads into the store.
//!
//! Applying a plan is idempotent. Existing use cases and configurations are
//! matched on their natural keys and left untouched, so a plan can be
//! extended and re-applied without duplicating rows.

use crate::error::{DbError, Result};
use crate::BenchmarkDb;
use serde::Deserialize;
use sqlx::{Row, Sqlite, Transaction};
use std::path::Path;
use tracing::{debug, info};

fn default_nr_of_runs() -> u32 {
    5
}

fn default_serverless() -> Vec<bool> {
    vec![true, false]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkPlan {
    /// Runs per configuration; averages smooth out one-off hiccups.
    #[serde(default = "default_nr_of_runs")]
    pub nr_of_runs: u32,
    #[serde(default)]
    pub use_cases: Vec<UseCasePlan>,
    pub dbt: Option<DbtPlan>,
    pub dlt: Option<DltPlan>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UseCasePlan {
    pub use_case: String,
    pub description: Option<String>,
    #[serde(default)]
    pub incremental: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SizeDimension {
    pub size: String,
    #[serde(default)]
    pub exclude_for_use_case: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbtPlan {
    pub job_id: i64,
    pub job_cluster_id: String,
    pub sql_warehouse_id: String,
    pub use_cases: Vec<String>,
    #[serde(default = "default_serverless")]
    pub serverless: Vec<bool>,
    pub cluster_sizes: Vec<SizeDimension>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerDimension {
    pub nr_of_workers: u32,
    pub photon: bool,
    #[serde(default)]
    pub exclude_for_use_case: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DltPlan {
    pub job_id: i64,
    /// Template pipeline; every configuration runs on its own copy.
    pub pipeline_id: String,
    pub use_cases: Vec<String>,
    pub workers: Vec<WorkerDimension>,
}

/// Rows inserted by one [`BenchmarkDb::apply_plan`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetupSummary {
    pub use_cases_added: u64,
    pub dbt_configs_added: u64,
    pub dlt_configs_added: u64,
}

impl BenchmarkPlan {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let plan: Self = serde_yaml::from_str(text)?;
        plan.check()?;
        Ok(plan)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    fn check(&self) -> Result<()> {
        if self.nr_of_runs == 0 {
            return Err(DbError::invalid_plan("nr_of_runs must be at least 1"));
        }
        if let Some(dlt) = &self.dlt {
            if let Some(w) = dlt.workers.iter().find(|w| w.nr_of_workers == 0) {
                return Err(DbError::invalid_plan(format!(
                    "DLT worker dimension needs at least one worker (photon={})",
                    w.photon
                )));
            }
        }
        Ok(())
    }
}

fn excluded(exclude: &[String], use_case: &str) -> bool {
    exclude.iter().any(|e| e == use_case)
}

impl BenchmarkDb {
    /// Insert whatever the plan adds to the store, in one transaction.
    pub async fn apply_plan(&self, plan: &BenchmarkPlan) -> Result<SetupSummary> {
        let mut tx = self.pool.begin().await?;
        let mut summary = SetupSummary::default();

        for uc in &plan.use_cases {
            let result = sqlx::query(
                r#"
                INSERT INTO benchmark_use_case (use_case, description, incremental)
                VALUES (?, ?, ?)
                ON CONFLICT(use_case) DO NOTHING
                "#,
            )
            .bind(&uc.use_case)
            .bind(uc.description.as_deref())
            .bind(uc.incremental)
            .execute(&mut *tx)
            .await?;
            summary.use_cases_added += result.rows_affected();
        }

        if let Some(dbt) = &plan.dbt {
            for use_case in &dbt.use_cases {
                let (use_case_id, incremental) = lookup_use_case(&mut tx, use_case).await?;
                for dim in &dbt.cluster_sizes {
                    if excluded(&dim.exclude_for_use_case, use_case) {
                        debug!(use_case, size = %dim.size, "DBT size excluded");
                        continue;
                    }
                    for &serverless in &dbt.serverless {
                        let exists = sqlx::query(
                            r#"
                            SELECT 1 FROM benchmark_run_config
                            WHERE use_case_id = ? AND run_type = 'DBT'
                              AND dbt_sql_cluster_size = ? AND dbt_sql_serverless = ?
                            "#,
                        )
                        .bind(use_case_id)
                        .bind(&dim.size)
                        .bind(serverless)
                        .fetch_optional(&mut *tx)
                        .await?
                        .is_some();
                        if exists {
                            continue;
                        }

                        sqlx::query(
                            r#"
                            INSERT INTO benchmark_run_config (
                                use_case_id, run_type, nr_of_runs, incremental, job_id,
                                dbt_job_cluster, dbt_sql_warehouse_id, dbt_sql_serverless,
                                dbt_sql_cluster_size
                            ) VALUES (?, 'DBT', ?, ?, ?, ?, ?, ?, ?)
                            "#,
                        )
                        .bind(use_case_id)
                        .bind(plan.nr_of_runs)
                        .bind(incremental)
                        .bind(dbt.job_id)
                        .bind(&dbt.job_cluster_id)
                        .bind(&dbt.sql_warehouse_id)
                        .bind(serverless)
                        .bind(&dim.size)
                        .execute(&mut *tx)
                        .await?;
                        summary.dbt_configs_added += 1;
                    }
                }
            }
        }

        if let Some(dlt) = &plan.dlt {
            for use_case in &dlt.use_cases {
                let (use_case_id, incremental) = lookup_use_case(&mut tx, use_case).await?;
                for dim in &dlt.workers {
                    if excluded(&dim.exclude_for_use_case, use_case) {
                        debug!(use_case, workers = dim.nr_of_workers, "DLT dimension excluded");
                        continue;
                    }
                    let exists = sqlx::query(
                        r#"
                        SELECT 1 FROM benchmark_run_config
                        WHERE use_case_id = ? AND run_type = 'DLT'
                          AND dlt_nr_of_workers = ? AND dlt_photon = ?
                        "#,
                    )
                    .bind(use_case_id)
                    .bind(dim.nr_of_workers)
                    .bind(dim.photon)
                    .fetch_optional(&mut *tx)
                    .await?
                    .is_some();
                    if exists {
                        continue;
                    }

                    sqlx::query(
                        r#"
                        INSERT INTO benchmark_run_config (
                            use_case_id, run_type, nr_of_runs, incremental, job_id,
                            dlt_pipeline_id, dlt_nr_of_workers, dlt_photon
                        ) VALUES (?, 'DLT', ?, ?, ?, ?, ?, ?)
                        "#,
                    )
                    .bind(use_case_id)
                    .bind(plan.nr_of_runs)
                    .bind(incremental)
                    .bind(dlt.job_id)
                    .bind(&dlt.pipeline_id)
                    .bind(dim.nr_of_workers)
                    .bind(dim.photon)
                    .execute(&mut *tx)
                    .await?;
                    summary.dlt_configs_added += 1;
                }
            }
        }

        tx.commit().await?;

        info!(
            use_cases = summary.use_cases_added,
            dbt_configs = summary.dbt_configs_added,
            dlt_configs = summary.dlt_configs_added,
            "Benchmark plan applied"
        );
        Ok(summary)
    }
}

async fn lookup_use_case(tx: &mut Transaction<'_, Sqlite>, use_case: &str) -> Result<(i64, bool)> {
    let row = sqlx::query("SELECT id, incremental FROM benchmark_use_case WHERE use_case = ?")
        .bind(use_case)
        .fetch_optional(&mut **tx)
        .await?;
    match row {
        Some(row) => Ok((row.get::<i64, _>("id"), row.get::<bool, _>("incremental"))),
        None => Err(DbError::invalid_plan(format!(
            "use case '{}' is referenced but not defined",
            use_case
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = r#"
nr_of_runs: 3
use_cases:
  - use_case: full_load
    description: Full load of the example model
  - use_case: incremental
    incremental: true
dbt:
  job_id: 11
  job_cluster_id: 0101-abc
  sql_warehouse_id: wh1
  use_cases: [full_load, incremental]
  cluster_sizes:
    - size: 2X-Small
    - size: Medium
      exclude_for_use_case: [incremental]
dlt:
  job_id: 22
  pipeline_id: template-pipeline
  use_cases: [full_load]
  workers:
    - {nr_of_workers: 1, photon: false}
    - {nr_of_workers: 2, photon: true}
"#;

    #[tokio::test]
    async fn test_apply_plan_is_idempotent() {
        let db = BenchmarkDb::open_memory().await.unwrap();
        let plan = BenchmarkPlan::from_yaml_str(PLAN).unwrap();

        let first = db.apply_plan(&plan).await.unwrap();
        // 2 sizes x 2 serverless for full_load, 1 x 2 for incremental.
        assert_eq!(
            first,
            SetupSummary {
                use_cases_added: 2,
                dbt_configs_added: 6,
                dlt_configs_added: 2,
            }
        );

        let second = db.apply_plan(&plan).await.unwrap();
        assert_eq!(second, SetupSummary::default());
    }

    #[tokio::test]
    async fn test_unknown_use_case_rolls_back() {
        let db = BenchmarkDb::open_memory().await.unwrap();
        let plan = BenchmarkPlan::from_yaml_str(
            r#"
use_cases:
  - use_case: a
dlt:
  job_id: 1
  pipeline_id: p
  use_cases: [a, b]
  workers: [{nr_of_workers: 1, photon: false}]
"#,
        )
        .unwrap();

        let err = db.apply_plan(&plan).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidPlan(_)));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM benchmark_use_case")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_plan_checks() {
        assert!(BenchmarkPlan::from_yaml_str("nr_of_runs: 0\n").is_err());
        assert!(BenchmarkPlan::from_yaml_str("nr_of_run: 2\n").is_err());
        let plan = BenchmarkPlan::from_yaml_str("{}").unwrap();
        assert_eq!(plan.nr_of_runs, 5);
    }
}
