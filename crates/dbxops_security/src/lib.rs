//! dbxops credential flows
//!
//! Provides:
//! - **Azure**: client-secret and certificate client credentials against Azure AD
//! - **AWS**: Databricks OAuth machine-to-machine plus a short-lived workspace token
//! - **GitHub**: App JWTs, installation tokens and the contents API
//!
//! [`AuthProvider::for_host`] picks the Databricks flow from the workspace host.
//! Token requests are never retried; failures propagate unchanged.

pub mod aws;
pub mod azure;
pub mod github;
mod pem;
pub mod provider;

pub use aws::AwsProvider;
pub use azure::{AzureCredential, AzureProvider, ClientCertificate};
pub use github::{GithubApp, GithubClient};
pub use provider::{AuthProvider, Credentials};

use thiserror::Error;

/// Scope requested from Azure AD for Databricks tokens (the Azure Databricks
/// resource application id).
pub const DATABRICKS_SCOPE: &str = "2ff814a6-3304-4ab8-85cb-cd0e6f879c1d/.default";

pub type Result<T> = std::result::Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Invalid client certificate: {0}")]
    InvalidCertificate(String),

    #[error("The private key is encrypted; set AZURE_CLIENT_CERTIFICATE_PASSWORD")]
    KeyPasswordRequired,

    #[error("Failed to decrypt the private key: {0}")]
    KeyDecryption(String),

    #[error("Failed to sign JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Turn a non-2xx response into [`AuthError::Http`], logging the body first.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(status = status.as_u16(), url = %url, "{}", body);
    Err(AuthError::Http {
        status: status.as_u16(),
        url,
        body,
    })
}

pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
