//! In-memory stand-ins for the Databricks API, shared by unit tests.

use crate::client::{ComputeApi, JobsApi, PipelinesApi, WorkspaceApi};
use crate::error::{Error, Result};
use crate::poll::RunLogSink;
use async_trait::async_trait;
use dbxops_protocol::jobs::{Job, RunNowRequest};
use dbxops_protocol::pipelines::StartUpdateRequest;
use dbxops_protocol::warehouses::{EditWarehouseRequest, Warehouse};
use dbxops_protocol::{
    ImportRequest, JobRun, ObjectType, PipelineUpdateState, RunLog, WarehouseState,
    WorkspaceObject,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

fn http_error(path: &str, status: u16) -> Error {
    Error::Http {
        method: "POST".into(),
        url: format!("fake://{}", path),
        status,
        body: "{\"error_code\":\"INTERNAL_ERROR\"}".into(),
    }
}

/// Pops scripted values; the last one repeats forever.
fn next_scripted<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

#[derive(Default)]
pub struct WorkspaceState {
    pub objects: Vec<WorkspaceObject>,
    pub mkdirs: Vec<String>,
    pub imports: Vec<ImportRequest>,
    pub deletes: Vec<String>,
    pub failing_deletes: HashSet<String>,
}

#[derive(Default)]
pub struct FakeWorkspace {
    pub state: Mutex<WorkspaceState>,
}

impl FakeWorkspace {
    pub fn add_file(&self, path: &str, created_at: i64) {
        self.state.lock().unwrap().objects.push(WorkspaceObject {
            path: path.to_string(),
            object_type: ObjectType::File,
            object_id: None,
            created_at: Some(created_at),
            modified_at: Some(created_at),
            language: None,
        });
    }

    pub fn add_dir(&self, path: &str) {
        self.state.lock().unwrap().objects.push(WorkspaceObject {
            path: path.to_string(),
            object_type: ObjectType::Directory,
            object_id: None,
            created_at: None,
            modified_at: None,
            language: None,
        });
    }

    pub fn fail_delete(&self, path: &str) {
        self.state.lock().unwrap().failing_deletes.insert(path.to_string());
    }

    pub fn imports(&self) -> Vec<ImportRequest> {
        self.state.lock().unwrap().imports.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }

    pub fn mkdirs_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().mkdirs.clone()
    }
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
}

#[async_trait]
impl WorkspaceApi for FakeWorkspace {
    async fn list(&self, path: &str) -> Result<Vec<WorkspaceObject>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .objects
            .iter()
            .filter(|o| parent(&o.path) == path)
            .cloned()
            .collect())
    }

    async fn mkdirs(&self, path: &str) -> Result<()> {
        self.state.lock().unwrap().mkdirs.push(path.to_string());
        Ok(())
    }

    async fn import(&self, request: &ImportRequest) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.imports.push(request.clone());
        state.objects.push(WorkspaceObject {
            path: request.path.clone(),
            object_type: ObjectType::File,
            object_id: None,
            created_at: Some(0),
            modified_at: Some(0),
            language: None,
        });
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_deletes.contains(path) {
            return Err(http_error(path, 500));
        }
        state.deletes.push(path.to_string());
        state.objects.retain(|o| o.path != path);
        Ok(())
    }
}

/// Scripted jobs, pipelines, warehouses and clusters.
#[derive(Default)]
pub struct FakeDatabricks {
    pub workspace: FakeWorkspace,
    pub inner: Mutex<FakeState>,
}

#[derive(Default)]
pub struct FakeState {
    pub job_names: HashMap<String, i64>,
    pub jobs: HashMap<i64, Value>,
    pub run_now: Vec<(i64, Option<bool>)>,
    pub run_script: VecDeque<JobRun>,
    pub get_run_calls: u32,
    pub job_updates: Vec<(i64, Value)>,

    pub pipelines: HashMap<String, Value>,
    pub pipeline_names: HashMap<String, String>,
    pub created_pipelines: Vec<Value>,
    pub updated_pipelines: Vec<(String, Value)>,
    pub validations: Vec<String>,
    pub update_script: VecDeque<PipelineUpdateState>,
    pub get_update_calls: u32,

    pub warehouse_script: VecDeque<WarehouseState>,
    pub warehouse_edits: Vec<(String, EditWarehouseRequest)>,
    pub warehouse_starts: u32,
    pub cluster: Value,
    pub cluster_edits: Vec<Value>,
    pub cluster_starts: Vec<String>,
}

impl FakeDatabricks {
    pub fn with<F: FnOnce(&mut FakeState)>(self, f: F) -> Self {
        f(&mut self.inner.lock().unwrap());
        self
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.inner.lock().unwrap()
    }
}

#[async_trait]
impl WorkspaceApi for FakeDatabricks {
    async fn list(&self, path: &str) -> Result<Vec<WorkspaceObject>> {
        self.workspace.list(path).await
    }

    async fn mkdirs(&self, path: &str) -> Result<()> {
        self.workspace.mkdirs(path).await
    }

    async fn import(&self, request: &ImportRequest) -> Result<()> {
        self.workspace.import(request).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.workspace.delete(path).await
    }
}

#[async_trait]
impl JobsApi for FakeDatabricks {
    async fn find_job_id(&self, name: &str) -> Result<Option<i64>> {
        Ok(self.state().job_names.get(name).copied())
    }

    async fn run_now(&self, request: &RunNowRequest) -> Result<i64> {
        let mut state = self.state();
        state
            .run_now
            .push((request.job_id, request.queue.map(|q| q.enabled)));
        Ok(1000 + state.run_now.len() as i64)
    }

    async fn get_run(&self, _run_id: i64) -> Result<JobRun> {
        let mut state = self.state();
        state.get_run_calls += 1;
        next_scripted(&mut state.run_script).ok_or_else(|| http_error("runs/get", 404))
    }

    async fn get_job(&self, job_id: i64) -> Result<Job> {
        let state = self.state();
        let settings = state
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| http_error("jobs/get", 404))?;
        Ok(Job { job_id, settings })
    }

    async fn update_job(&self, job_id: i64, new_settings: Value) -> Result<()> {
        self.state().job_updates.push((job_id, new_settings));
        Ok(())
    }
}

#[async_trait]
impl PipelinesApi for FakeDatabricks {
    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Value> {
        self.state()
            .pipelines
            .get(pipeline_id)
            .cloned()
            .ok_or_else(|| http_error("pipelines", 404))
    }

    async fn find_pipeline(&self, name: &str) -> Result<Option<String>> {
        Ok(self.state().pipeline_names.get(name).cloned())
    }

    async fn create_pipeline(&self, settings: &Value) -> Result<String> {
        let mut state = self.state();
        state.created_pipelines.push(settings.clone());
        let id = format!("created-{}", state.created_pipelines.len());
        if let Some(name) = settings.get("name").and_then(Value::as_str) {
            state.pipeline_names.insert(name.to_string(), id.clone());
        }
        Ok(id)
    }

    async fn update_pipeline(&self, pipeline_id: &str, settings: &Value) -> Result<()> {
        self.state()
            .updated_pipelines
            .push((pipeline_id.to_string(), settings.clone()));
        Ok(())
    }

    async fn start_update(&self, pipeline_id: &str, request: &StartUpdateRequest) -> Result<String> {
        assert!(request.validate_only);
        let mut state = self.state();
        state.validations.push(pipeline_id.to_string());
        Ok(format!("update-{}", state.validations.len()))
    }

    async fn get_update(&self, _pipeline_id: &str, _update_id: &str) -> Result<PipelineUpdateState> {
        let mut state = self.state();
        state.get_update_calls += 1;
        next_scripted(&mut state.update_script).ok_or_else(|| http_error("updates", 404))
    }
}

#[async_trait]
impl ComputeApi for FakeDatabricks {
    async fn get_warehouse(&self, warehouse_id: &str) -> Result<Warehouse> {
        let mut state = self.state();
        let warehouse_state =
            next_scripted(&mut state.warehouse_script).unwrap_or(WarehouseState::Running);
        Ok(Warehouse {
            id: warehouse_id.to_string(),
            cluster_size: Some("Small".into()),
            enable_serverless_compute: Some(true),
            state: warehouse_state,
        })
    }

    async fn edit_warehouse(&self, warehouse_id: &str, request: &EditWarehouseRequest) -> Result<()> {
        self.state()
            .warehouse_edits
            .push((warehouse_id.to_string(), request.clone()));
        Ok(())
    }

    async fn start_warehouse(&self, _warehouse_id: &str) -> Result<()> {
        self.state().warehouse_starts += 1;
        Ok(())
    }

    async fn get_cluster(&self, _cluster_id: &str) -> Result<Value> {
        Ok(self.state().cluster.clone())
    }

    async fn edit_cluster(&self, settings: &Value) -> Result<()> {
        let mut state = self.state();
        state.cluster_edits.push(settings.clone());
        if let Some(tags) = settings.get("custom_tags") {
            state.cluster["custom_tags"] = tags.clone();
        }
        Ok(())
    }

    async fn start_cluster(&self, cluster_id: &str) -> Result<()> {
        self.state().cluster_starts.push(cluster_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRunLog {
    logs: Mutex<Vec<RunLog>>,
}

impl MemoryRunLog {
    pub fn logs(&self) -> Vec<RunLog> {
        self.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunLogSink for MemoryRunLog {
    async fn append(&self, log: &RunLog) -> Result<()> {
        self.logs.lock().unwrap().push(log.clone());
        Ok(())
    }
}
