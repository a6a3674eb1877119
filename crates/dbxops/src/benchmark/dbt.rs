//! Preparing one DBT benchmark run: warehouse, cluster and job.

use super::layout::dbt_tasks;
use super::tags::{BenchmarkTags, Component};
use super::BenchmarkOptions;
use crate::client::DatabricksApi;
use crate::error::Result;
use crate::poll::{wait_for_warehouse, PollPolicy};
use dbxops_protocol::warehouses::{EditWarehouseRequest, WarehouseTags};
use dbxops_protocol::{DbtSizing, RunConfig, RunType};
use serde_json::{json, Map, Value};
use tracing::info;

/// Cluster fields sent back on edit; anything omitted would be reset.
const CLUSTER_EDIT_FIELDS: &[&str] = &[
    "cluster_id",
    "cluster_name",
    "spark_version",
    "node_type_id",
    "autotermination_minutes",
    "enable_elastic_disk",
    "single_user_name",
    "data_security_mode",
    "runtime_engine",
    "num_workers",
    "spark_env_vars",
];

pub fn dbt_command(incremental: bool) -> String {
    let mut command = "run --select tag:example".to_string();
    if !incremental {
        command.push_str(" --full-refresh");
    }
    command
}

/// `--vars` argument giving every run its own table prefix.
pub fn dbt_vars(sizing: &DbtSizing, run: u32) -> String {
    format!(
        r#"--vars {{"prefix_table":true,"prefix":"{}__run_{}_"}}"#,
        sizing.label(),
        run
    )
}

pub fn warehouse_edit(sizing: &DbtSizing, tags: &BenchmarkTags) -> EditWarehouseRequest {
    EditWarehouseRequest {
        cluster_size: sizing.sql_cluster_size.clone(),
        enable_serverless_compute: sizing.sql_serverless,
        warehouse_type: if sizing.sql_serverless { "PRO" } else { "CLASSIC" }.to_string(),
        tags: WarehouseTags {
            custom_tags: tags.custom_tags(),
        },
    }
}

/// Body of the cluster edit, or `None` when the tags are already in place.
pub fn cluster_edit(cluster: &Value, tags: &BenchmarkTags) -> Option<Value> {
    let current = cluster
        .get("custom_tags")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let merged = tags.merged_into(cluster.get("custom_tags"));
    if merged == current {
        return None;
    }

    let mut body: Map<String, Value> = CLUSTER_EDIT_FIELDS
        .iter()
        .map(|field| (field.to_string(), cluster.get(*field).cloned().unwrap_or(Value::Null)))
        .collect();
    body.insert("custom_tags".into(), Value::Object(merged));
    Some(Value::Object(body))
}

fn serverless_label(serverless: bool) -> &'static str {
    if serverless {
        "serverless"
    } else {
        "server-based"
    }
}

/// Put warehouse, cluster and job in the shape of `config` for run `run`,
/// and wait until the warehouse serves queries.
pub async fn prepare_run<A>(
    api: &A,
    config: &RunConfig,
    sizing: &DbtSizing,
    run: u32,
    options: &BenchmarkOptions,
) -> Result<()>
where
    A: DatabricksApi + ?Sized,
{
    let label = sizing.label();
    let tags = |component: Component| BenchmarkTags::new(RunType::Dbt, component, &label, &config.use_case, run);

    let warehouse = api.get_warehouse(&sizing.sql_warehouse_id).await?;
    let current_size = warehouse.cluster_size.unwrap_or_default().to_lowercase();
    let current_serverless = warehouse.enable_serverless_compute.unwrap_or(false);
    if current_size != sizing.sql_cluster_size.to_lowercase() || current_serverless != sizing.sql_serverless {
        info!(
            "Cluster size is {} ({}), changing to {} ({})",
            current_size,
            serverless_label(current_serverless),
            sizing.sql_cluster_size,
            serverless_label(sizing.sql_serverless)
        );
    }
    api.edit_warehouse(&sizing.sql_warehouse_id, &warehouse_edit(sizing, &tags(Component::Sql)))
        .await?;

    let cluster = api.get_cluster(&sizing.job_cluster_id).await?;
    match cluster_edit(&cluster, &tags(Component::JobCluster)) {
        Some(body) => api.edit_cluster(&body).await?,
        None => info!("Tags already set. No need to update."),
    }
    if cluster.get("state").and_then(Value::as_str) == Some("TERMINATED") {
        info!("Starting terminated cluster ({})", sizing.job_cluster_id);
        api.start_cluster(&sizing.job_cluster_id).await?;
    }

    info!("Updating job ({})", config.job_id);
    let job = api.get_job(config.job_id).await?;
    let tasks = dbt_tasks(
        config.job_id,
        &job.settings,
        &sizing.job_cluster_id,
        &dbt_command(config.incremental),
        &dbt_vars(sizing, run),
    )?;
    let new_settings = json!({
        "tags": tags(Component::Job).to_map(),
        "tasks": tasks,
    });
    api.update_job(config.job_id, new_settings).await?;

    let policy = options
        .warehouse
        .unwrap_or(PollPolicy::warehouse(sizing.sql_serverless));
    wait_for_warehouse(api, &sizing.sql_warehouse_id, policy).await
}
