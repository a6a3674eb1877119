use super::{ComputeApi, JobsApi, PipelinesApi, WorkspaceApi};
use crate::error::{Error, Result};
use async_trait::async_trait;
use dbxops_protocol::jobs::{Job, JobsListResponse, RunNowRequest, RunNowResponse, UpdateJobRequest};
use dbxops_protocol::pipelines::{
    CreatePipelineResponse, GetUpdateResponse, ListPipelinesResponse, StartUpdateRequest,
    StartUpdateResponse,
};
use dbxops_protocol::warehouses::{EditWarehouseRequest, Warehouse};
use dbxops_protocol::workspace::{ListResponse, PathRequest};
use dbxops_protocol::{normalize_host, ImportRequest, JobRun, PipelineUpdateState, WorkspaceObject};
use dbxops_security::AuthProvider;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error};

/// Bearer-authenticated client for one workspace.
///
/// Requests are sent once. A non-2xx response has its body logged and is
/// returned as [`Error::Http`].
#[derive(Clone)]
pub struct DatabricksClient {
    host: String,
    token: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for DatabricksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabricksClient").field("host", &self.host).finish()
    }
}

impl DatabricksClient {
    pub fn new(host: &str, token: impl Into<String>) -> Self {
        Self {
            host: normalize_host(host),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Fetch a fresh token from `provider` and build a client with it.
    pub async fn connect(host: &str, provider: &AuthProvider) -> Result<Self> {
        let token = provider.access_token().await?;
        Ok(Self::new(host, token))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.host, path))
            .bearer_auth(&self.token)
    }

    async fn execute(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build()?;
        let method = request.method().to_string();
        let url = request.url().to_string();
        debug!(%method, %url, "Databricks request");

        let response = self.http.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), %method, %url, "{}", body);
        Err(Error::Http {
            method,
            url,
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let url = response.url().to_string();
        let text = response.text().await?;
        // Several endpoints answer `200` with an empty body.
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| Error::invalid_response(url, e))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self.execute(self.request(Method::GET, path).query(query)).await?;
        Self::read_json(response).await
    }

    async fn send<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.execute(self.request(method, path).json(body)).await?;
        Self::read_json(response).await
    }

    async fn post<B: Serialize + ?Sized + Sync>(&self, path: &str, body: &B) -> Result<()> {
        self.execute(self.request(Method::POST, path).json(body)).await?;
        Ok(())
    }
}

#[async_trait]
impl WorkspaceApi for DatabricksClient {
    async fn list(&self, path: &str) -> Result<Vec<WorkspaceObject>> {
        let list: ListResponse = self.get("/api/2.0/workspace/list", &[("path", path)]).await?;
        Ok(list.objects.unwrap_or_default())
    }

    async fn mkdirs(&self, path: &str) -> Result<()> {
        self.post("/api/2.0/workspace/mkdirs", &PathRequest { path }).await
    }

    async fn import(&self, request: &ImportRequest) -> Result<()> {
        self.post("/api/2.0/workspace/import", request).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.post("/api/2.0/workspace/delete", &PathRequest { path }).await
    }
}

#[async_trait]
impl JobsApi for DatabricksClient {
    async fn find_job_id(&self, name: &str) -> Result<Option<i64>> {
        // Filtering on name yields zero or one job.
        let list: JobsListResponse = self.get("/api/2.1/jobs/list", &[("name", name)]).await?;
        Ok(list
            .jobs
            .and_then(|jobs| jobs.into_iter().next())
            .map(|job| job.job_id))
    }

    async fn run_now(&self, request: &RunNowRequest) -> Result<i64> {
        let response: RunNowResponse = self.send(Method::POST, "/api/2.1/jobs/run-now", request).await?;
        Ok(response.run_id)
    }

    async fn get_run(&self, run_id: i64) -> Result<JobRun> {
        let run_id = run_id.to_string();
        self.get("/api/2.1/jobs/runs/get", &[("run_id", run_id.as_str())]).await
    }

    async fn get_job(&self, job_id: i64) -> Result<Job> {
        let job_id = job_id.to_string();
        self.get("/api/2.1/jobs/get", &[("job_id", job_id.as_str())]).await
    }

    async fn update_job(&self, job_id: i64, new_settings: Value) -> Result<()> {
        self.post(
            "/api/2.0/jobs/update",
            &UpdateJobRequest {
                job_id,
                new_settings,
            },
        )
        .await
    }
}

#[async_trait]
impl PipelinesApi for DatabricksClient {
    async fn get_pipeline(&self, pipeline_id: &str) -> Result<Value> {
        self.get(&format!("/api/2.0/pipelines/{}", pipeline_id), &[]).await
    }

    async fn find_pipeline(&self, name: &str) -> Result<Option<String>> {
        let filter = format!("name like '{}'", name);
        let list: ListPipelinesResponse = self
            .get("/api/2.0/pipelines", &[("filter", filter.as_str())])
            .await?;
        Ok(list
            .statuses
            .and_then(|statuses| statuses.into_iter().next())
            .map(|status| status.pipeline_id))
    }

    async fn create_pipeline(&self, settings: &Value) -> Result<String> {
        let response: CreatePipelineResponse =
            self.send(Method::POST, "/api/2.0/pipelines", settings).await?;
        Ok(response.pipeline_id)
    }

    async fn update_pipeline(&self, pipeline_id: &str, settings: &Value) -> Result<()> {
        let _: Value = self
            .send(Method::PUT, &format!("/api/2.0/pipelines/{}", pipeline_id), settings)
            .await?;
        Ok(())
    }

    async fn start_update(&self, pipeline_id: &str, request: &StartUpdateRequest) -> Result<String> {
        let response: StartUpdateResponse = self
            .send(
                Method::POST,
                &format!("/api/2.0/pipelines/{}/updates", pipeline_id),
                request,
            )
            .await?;
        Ok(response.update_id)
    }

    async fn get_update(&self, pipeline_id: &str, update_id: &str) -> Result<PipelineUpdateState> {
        let response: GetUpdateResponse = self
            .get(
                &format!("/api/2.0/pipelines/{}/updates/{}", pipeline_id, update_id),
                &[],
            )
            .await?;
        Ok(response.update.state)
    }
}

#[async_trait]
impl ComputeApi for DatabricksClient {
    async fn get_warehouse(&self, warehouse_id: &str) -> Result<Warehouse> {
        self.get(&format!("/api/2.0/sql/warehouses/{}", warehouse_id), &[]).await
    }

    async fn edit_warehouse(&self, warehouse_id: &str, request: &EditWarehouseRequest) -> Result<()> {
        self.post(&format!("/api/2.0/sql/warehouses/{}/edit", warehouse_id), request)
            .await
    }

    async fn start_warehouse(&self, warehouse_id: &str) -> Result<()> {
        self.post(&format!("/api/2.0/sql/warehouses/{}/start", warehouse_id), &json!({}))
            .await
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<Value> {
        self.get("/api/2.0/clusters/get", &[("cluster_id", cluster_id)]).await
    }

    async fn edit_cluster(&self, settings: &Value) -> Result<()> {
        self.post("/api/2.0/clusters/edit", settings).await
    }

    async fn start_cluster(&self, cluster_id: &str) -> Result<()> {
        self.post("/api/2.0/clusters/start", &json!({ "cluster_id": cluster_id }))
            .await
    }
}
