//! SQL warehouse payloads (`/api/2.0/sql/warehouses/*`).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarehouseState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Deleting,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl WarehouseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarehouseState::Starting => "STARTING",
            WarehouseState::Running => "RUNNING",
            WarehouseState::Stopping => "STOPPING",
            WarehouseState::Stopped => "STOPPED",
            WarehouseState::Deleting => "DELETING",
            WarehouseState::Deleted => "DELETED",
            WarehouseState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for WarehouseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Warehouse {
    pub id: String,
    #[serde(default)]
    pub cluster_size: Option<String>,
    #[serde(default)]
    pub enable_serverless_compute: Option<bool>,
    pub state: WarehouseState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomTag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseTags {
    pub custom_tags: Vec<CustomTag>,
}

/// Body of `POST /api/2.0/sql/warehouses/{id}/edit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditWarehouseRequest {
    pub cluster_size: String,
    pub enable_serverless_compute: bool,
    pub warehouse_type: String,
    pub tags: WarehouseTags,
}
