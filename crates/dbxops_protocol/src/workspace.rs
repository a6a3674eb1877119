//! Workspace API payloads (`/api/2.0/workspace/*`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    Notebook,
    Directory,
    Library,
    File,
    Repo,
    Dashboard,
    #[serde(other)]
    Unknown,
}

/// One entry of a workspace folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceObject {
    pub path: String,
    pub object_type: ObjectType,
    #[serde(default)]
    pub object_id: Option<i64>,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub modified_at: Option<i64>,
    #[serde(default)]
    pub language: Option<String>,
}

impl WorkspaceObject {
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Response of `GET /api/2.0/workspace/list`. An empty folder has no `objects`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub objects: Option<Vec<WorkspaceObject>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImportFormat {
    #[default]
    Auto,
    Source,
    Jupyter,
}

/// Body of `POST /api/2.0/workspace/import`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub path: String,
    pub format: ImportFormat,
    /// Base64-encoded file content.
    pub content: String,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathRequest<'a> {
    pub path: &'a str,
}
