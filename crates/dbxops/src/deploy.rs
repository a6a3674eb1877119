//! Upload a wheel into its workspace folder, once per version.

use crate::actions::AnnotationSink;
use crate::client::WorkspaceApi;
use crate::error::{Error, Result};
use crate::wheel::{list_artifacts, version_from_wheel_path};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dbxops_protocol::{ImportFormat, ImportRequest};
use std::path::Path;
use tracing::info;

pub const DUPLICATE_VERSION_TITLE: &str = "Wheel version already deployed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub version: String,
    pub target_path: String,
    /// `false` when the version was already present and nothing was uploaded.
    pub deployed: bool,
}

/// Deploy `source` into `folder`.
///
/// An already deployed version (by version equality, not file name) is left
/// alone: one warning annotation is emitted and the call succeeds.
pub async fn deploy<W>(
    api: &W,
    source: &Path,
    folder: &str,
    annotations: &dyn AnnotationSink,
) -> Result<DeployOutcome>
where
    W: WorkspaceApi + ?Sized,
{
    api.mkdirs(folder).await?;

    let source_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidWheelName {
            file_name: source.display().to_string(),
            reason: "path has no UTF-8 file name".to_string(),
        })?;
    let (raw_version, version) = version_from_wheel_path(source_name)?;
    info!("Deploying wheel version: {}", raw_version);

    let target_path = format!("{}/{}", folder, source_name);
    let existing = list_artifacts(api, folder).await?;
    if existing.iter().any(|a| a.version == version) {
        annotations.warning(
            DUPLICATE_VERSION_TITLE,
            &format!(
                "Version '{}' is already deployed and will NOT be overwritten.",
                raw_version
            ),
        );
        return Ok(DeployOutcome {
            version: raw_version,
            target_path,
            deployed: false,
        });
    }

    let bytes = tokio::fs::read(source).await.map_err(|e| Error::Io {
        path: source.to_path_buf(),
        source: e,
    })?;

    info!(path = %target_path, bytes = bytes.len(), "Starting deploy");
    api.import(&ImportRequest {
        path: target_path.clone(),
        format: ImportFormat::Auto,
        content: STANDARD.encode(&bytes),
        overwrite: false,
    })
    .await?;

    Ok(DeployOutcome {
        version: raw_version,
        target_path,
        deployed: true,
    })
}
