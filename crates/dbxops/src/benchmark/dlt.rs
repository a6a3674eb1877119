//! Preparing one DLT benchmark run: a pipeline copy per configuration and run.

use super::layout::dlt_tasks;
use super::tags::{BenchmarkTags, Component};
use super::BenchmarkOptions;
use crate::client::DatabricksApi;
use crate::error::{Error, Result};
use crate::poll::wait_for_pipeline_update;
use dbxops_protocol::pipelines::StartUpdateRequest;
use dbxops_protocol::{DltSizing, RunConfig, RunType};
use serde_json::{json, Value};
use tracing::info;

pub fn pipeline_name(sizing: &DltSizing, run: u32) -> String {
    format!("benchmark_example_data__{}__run_{}", sizing.label(), run)
}

/// Settings of the per-run pipeline, derived from the template's spec.
///
/// The copy runs on the template's first cluster, pinned to a fixed worker
/// count, in development mode.
pub fn pipeline_settings(
    template_id: &str,
    template: &Value,
    sizing: &DltSizing,
    tags: &BenchmarkTags,
    run: u32,
) -> Result<Value> {
    let context = format!("pipeline {}", template_id);
    let spec = template
        .get("spec")
        .filter(|s| s.is_object())
        .ok_or_else(|| Error::invalid_response(&context, "missing spec"))?;
    let mut cluster = spec
        .get("clusters")
        .and_then(|c| c.get(0))
        .and_then(Value::as_object)
        .cloned()
        .ok_or_else(|| Error::invalid_response(&context, "spec has no clusters"))?;

    let autoscale = cluster
        .entry("autoscale")
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| Error::invalid_response(&context, "cluster autoscale is not an object"))?;
    autoscale.insert("min_workers".into(), Value::from(sizing.nr_of_workers));
    autoscale.insert("max_workers".into(), Value::from(sizing.nr_of_workers));
    let custom_tags = tags.merged_into(cluster.get("custom_tags"));
    cluster.insert("custom_tags".into(), Value::Object(custom_tags));

    let field = |name: &str| spec.get(name).cloned().unwrap_or(Value::Null);
    Ok(json!({
        "name": pipeline_name(sizing, run),
        "target": field("target"),
        "catalog": field("catalog"),
        "clusters": [cluster],
        "libraries": field("libraries"),
        "photon": sizing.photon,
        "development": true,
        "edition": field("edition"),
        "channel": field("channel"),
        "configuration": {
            "table_prefix": format!("{}__run_{}_", sizing.label(), run),
            "pipelines.clusterShutdown.delay": "60s",
        },
    }))
}

fn template_shape(template: &Value) -> (Option<u64>, Option<bool>) {
    let spec = &template["spec"];
    (
        spec["clusters"][0]["autoscale"]["max_workers"].as_u64(),
        spec["photon"].as_bool(),
    )
}

/// Create or update the pipeline copy for `run`, point the job at it and
/// wait until a validate-only update has created its tables.
///
/// Returns the id of the pipeline the job now runs.
pub async fn prepare_run<A>(
    api: &A,
    config: &RunConfig,
    sizing: &DltSizing,
    run: u32,
    options: &BenchmarkOptions,
) -> Result<String>
where
    A: DatabricksApi + ?Sized,
{
    let label = sizing.label();
    let tags = |component: Component| BenchmarkTags::new(RunType::Dlt, component, &label, &config.use_case, run);

    let template = api.get_pipeline(&sizing.pipeline_id).await?;
    let (workers, photon) = template_shape(&template);
    if workers != Some(u64::from(sizing.nr_of_workers)) || photon != Some(sizing.photon) {
        info!(
            "Changing pipeline (workers={:?}, photon={:?}) to '{}' worker(s) and photon set to '{}'",
            workers, photon, sizing.nr_of_workers, sizing.photon
        );
    }

    let settings = pipeline_settings(
        &sizing.pipeline_id,
        &template,
        sizing,
        &tags(Component::DltPipeline),
        run,
    )?;
    let name = pipeline_name(sizing, run);
    let pipeline_id = match api.find_pipeline(&name).await? {
        Some(id) => {
            info!("Updating existing pipeline '{}'", id);
            api.update_pipeline(&id, &settings).await?;
            id
        }
        None => {
            info!("Creating new pipeline '{}'", name);
            api.create_pipeline(&settings).await?
        }
    };

    info!("Updating job ({})", config.job_id);
    let job = api.get_job(config.job_id).await?;
    let tasks = dlt_tasks(config.job_id, &job.settings, &pipeline_id, !config.incremental)?;
    let new_settings = json!({
        "tags": tags(Component::Job).to_map(),
        "tasks": tasks,
    });
    api.update_job(config.job_id, new_settings).await?;

    let update_id = api
        .start_update(&pipeline_id, &StartUpdateRequest { validate_only: true })
        .await?;
    wait_for_pipeline_update(api, &pipeline_id, &update_id, options.pipeline_update).await?;
    Ok(pipeline_id)
}
