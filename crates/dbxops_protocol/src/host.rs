//! Workspace host handling.

use std::fmt;

/// Marker that identifies an Azure Databricks workspace host.
const AZURE_HOST_MARKER: &str = "azuredatabricks";

/// Normalize a workspace host for use as an API base URL.
///
/// A bare host gets `https://`; an explicit scheme is kept. The result never
/// ends with `/`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let mut url = if host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    if url.ends_with('/') {
        url.pop();
    }
    url
}

/// Cloud the workspace runs on; decides which credential flow is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudPlatform {
    Azure,
    Aws,
}

impl CloudPlatform {
    pub fn from_host(host: &str) -> Self {
        if host.to_lowercase().contains(AZURE_HOST_MARKER) {
            CloudPlatform::Azure
        } else {
            CloudPlatform::Aws
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CloudPlatform::Azure => "azure",
            CloudPlatform::Aws => "aws",
        }
    }
}

impl fmt::Display for CloudPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
