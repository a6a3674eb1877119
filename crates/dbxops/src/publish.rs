//! Commit a local file to a GitHub repository as a GitHub App.

use crate::error::{Error, Result};
use dbxops_security::GithubClient;
use std::path::Path;
use tracing::{debug, info};

/// Where a file lands: `org/repo`, `branch`, and a directory in the repo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub org: String,
    pub repo: String,
    pub branch: String,
    pub directory: String,
}

impl PublishTarget {
    /// Repository path of `file_name` under the target directory.
    pub fn repo_path(&self, file_name: &str) -> String {
        let dir = self.directory.trim_matches('/');
        if dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", dir, file_name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub repo_path: String,
    /// `true` when an existing file was replaced.
    pub updated: bool,
}

/// Create or update `source` in the target directory.
///
/// The current blob sha is looked up first and passed along only when the
/// file already exists.
pub async fn publish_file(
    client: &GithubClient,
    target: &PublishTarget,
    source: &Path,
    message: &str,
) -> Result<PublishOutcome> {
    let file_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Io {
            path: source.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
        })?;
    let content = std::fs::read(source).map_err(|e| Error::Io {
        path: source.to_path_buf(),
        source: e,
    })?;

    let repo_path = target.repo_path(file_name);
    debug!(
        "Checking existence of '{}/{}/{}' in branch '{}'",
        target.org, target.repo, repo_path, target.branch
    );
    let existing = client
        .get_content(&target.org, &target.repo, &target.branch, &repo_path)
        .await?;

    info!(
        "Committing '{}' to '{}' in branch '{}'",
        file_name, repo_path, target.branch
    );
    client
        .put_content(
            &target.org,
            &target.repo,
            &target.branch,
            &repo_path,
            &content,
            message,
            existing.as_ref().map(|c| c.sha.as_str()),
        )
        .await?;

    Ok(PublishOutcome {
        repo_path,
        updated: existing.is_some(),
    })
}
