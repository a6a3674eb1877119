//! Remove wheels that fall outside the retention policy.

use crate::client::WorkspaceApi;
use crate::error::{Error, Result};
use crate::wheel::{list_artifacts, wheel_folder, ArtifactRecord, RetentionPolicy};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{error, info};

/// Pause between delete calls to stay under the workspace rate limit.
pub const DELETE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub folder: String,
    /// Wheels found in the folder before anything was removed.
    pub found: usize,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

impl CleanupOutcome {
    /// `Err` when any delete failed.
    pub fn check(&self) -> Result<()> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(Error::CleanupFailed(self.failed.clone()))
        }
    }
}

/// Apply `policy` to the wheels of `wheel_name`.
///
/// Deletes run one at a time with `delay` in between. A failed delete is
/// logged and the pass continues with the next wheel; nothing is rolled back.
pub async fn cleanup<W>(
    api: &W,
    wheel_name: &str,
    policy: RetentionPolicy,
    now: DateTime<Utc>,
    delay: Duration,
) -> Result<CleanupOutcome>
where
    W: WorkspaceApi + ?Sized,
{
    let folder = wheel_folder(wheel_name);
    api.mkdirs(&folder).await?;

    let artifacts = list_artifacts(api, &folder).await?;
    info!(
        folder = %folder,
        found = artifacts.len(),
        keep_count = policy.keep_count,
        cutoff = %policy.cutoff(now).format("%Y-%m-%d"),
        "Applying retention policy"
    );

    let doomed = policy.select_for_deletion(&artifacts, now);
    let mut outcome = CleanupOutcome {
        folder,
        found: artifacts.len(),
        ..Default::default()
    };

    for (i, artifact) in doomed.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        delete_one(api, artifact, &mut outcome).await;
    }

    Ok(outcome)
}

async fn delete_one<W>(api: &W, artifact: &ArtifactRecord, outcome: &mut CleanupOutcome)
where
    W: WorkspaceApi + ?Sized,
{
    info!(version = %artifact.version, "Deleting wheel '{}'", artifact.path);
    match api.delete(&artifact.path).await {
        Ok(()) => outcome.deleted.push(artifact.path.clone()),
        Err(e) => {
            error!(path = %artifact.path, "Failed to delete wheel: {}", e);
            outcome.failed.push(artifact.path.clone());
        }
    }
}
