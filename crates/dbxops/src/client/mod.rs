//! Databricks REST surface used by the CI and benchmark commands.
//!
//! Operations are grouped into small traits so each command depends only on
//! the part of the API it calls, and tests can substitute in-memory fakes.
//! [`DatabricksClient`] implements all of them over HTTP.

mod http;

pub use http::DatabricksClient;

use crate::error::Result;
use async_trait::async_trait;
use dbxops_protocol::jobs::{Job, RunNowRequest};
use dbxops_protocol::pipelines::StartUpdateRequest;
use dbxops_protocol::warehouses::{EditWarehouseRequest, Warehouse};
use dbxops_protocol::{ImportRequest, JobRun, PipelineUpdateState, WorkspaceObject};
use serde_json::Value;

/// `/api/2.0/workspace/*`
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// Objects directly under `path`. An empty folder yields an empty list.
    async fn list(&self, path: &str) -> Result<Vec<WorkspaceObject>>;

    /// Create `path` and missing parents. Succeeds if it already exists.
    async fn mkdirs(&self, path: &str) -> Result<()>;

    async fn import(&self, request: &ImportRequest) -> Result<()>;

    async fn delete(&self, path: &str) -> Result<()>;
}

/// `/api/2.1/jobs/*`
#[async_trait]
pub trait JobsApi: Send + Sync {
    /// Id of the job with exactly this name, if any.
    async fn find_job_id(&self, name: &str) -> Result<Option<i64>>;

    /// Trigger a run and return its run id.
    async fn run_now(&self, request: &RunNowRequest) -> Result<i64>;

    async fn get_run(&self, run_id: i64) -> Result<JobRun>;

    async fn get_job(&self, job_id: i64) -> Result<Job>;

    /// Partial update: top-level fields of `new_settings` replace the job's.
    async fn update_job(&self, job_id: i64, new_settings: Value) -> Result<()>;
}

/// `/api/2.0/pipelines/*`
#[async_trait]
pub trait PipelinesApi: Send + Sync {
    /// Full pipeline definition, including its `spec`.
    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Value>;

    /// Id of the first pipeline whose name matches `name`.
    async fn find_pipeline(&self, name: &str) -> Result<Option<String>>;

    /// Create a pipeline and return its id.
    async fn create_pipeline(&self, settings: &Value) -> Result<String>;

    async fn update_pipeline(&self, pipeline_id: &str, settings: &Value) -> Result<()>;

    /// Start an update and return its update id.
    async fn start_update(&self, pipeline_id: &str, request: &StartUpdateRequest) -> Result<String>;

    async fn get_update(&self, pipeline_id: &str, update_id: &str) -> Result<PipelineUpdateState>;
}

/// SQL warehouses and all-purpose clusters.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn get_warehouse(&self, warehouse_id: &str) -> Result<Warehouse>;

    async fn edit_warehouse(&self, warehouse_id: &str, request: &EditWarehouseRequest) -> Result<()>;

    async fn start_warehouse(&self, warehouse_id: &str) -> Result<()>;

    /// Raw cluster definition as returned by `clusters/get`.
    async fn get_cluster(&self, cluster_id: &str) -> Result<Value>;

    async fn edit_cluster(&self, settings: &Value) -> Result<()>;

    async fn start_cluster(&self, cluster_id: &str) -> Result<()>;
}

/// Everything the benchmark lineages call.
pub trait DatabricksApi: WorkspaceApi + JobsApi + PipelinesApi + ComputeApi {}

impl<T> DatabricksApi for T where T: WorkspaceApi + JobsApi + PipelinesApi + ComputeApi {}
