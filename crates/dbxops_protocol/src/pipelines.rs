//! Delta Live Tables pipeline payloads (`/api/2.0/pipelines/*`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// State of a pipeline update. The strings are matched verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineUpdateState {
    Queued,
    Created,
    Initializing,
    WaitingForResources,
    SettingUpTables,
    Resetting,
    Stopping,
    Running,
    Completed,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PipelineUpdateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineUpdateState::Queued => "QUEUED",
            PipelineUpdateState::Created => "CREATED",
            PipelineUpdateState::Initializing => "INITIALIZING",
            PipelineUpdateState::WaitingForResources => "WAITING_FOR_RESOURCES",
            PipelineUpdateState::SettingUpTables => "SETTING_UP_TABLES",
            PipelineUpdateState::Resetting => "RESETTING",
            PipelineUpdateState::Stopping => "STOPPING",
            PipelineUpdateState::Running => "RUNNING",
            PipelineUpdateState::Completed => "COMPLETED",
            PipelineUpdateState::Failed => "FAILED",
            PipelineUpdateState::Canceled => "CANCELED",
            PipelineUpdateState::Unknown => "UNKNOWN",
        }
    }

    /// States in which a validate-only update is still working.
    ///
    /// `RUNNING` is deliberately absent: a validate-only update never runs.
    pub fn is_validation_in_progress(&self) -> bool {
        matches!(
            self,
            PipelineUpdateState::Queued
                | PipelineUpdateState::Created
                | PipelineUpdateState::Initializing
                | PipelineUpdateState::WaitingForResources
                | PipelineUpdateState::SettingUpTables
                | PipelineUpdateState::Resetting
                | PipelineUpdateState::Stopping
        )
    }
}

impl fmt::Display for PipelineUpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDetails {
    pub state: PipelineUpdateState,
}

/// Response of `GET /api/2.0/pipelines/{id}/updates/{update_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct GetUpdateResponse {
    pub update: UpdateDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartUpdateRequest {
    pub validate_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartUpdateResponse {
    pub update_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePipelineResponse {
    pub pipeline_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineStatus {
    pub pipeline_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Response of `GET /api/2.0/pipelines`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPipelinesResponse {
    #[serde(default)]
    pub statuses: Option<Vec<PipelineStatus>>,
}
