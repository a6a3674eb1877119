//! Connection flags and path resolution shared by the commands.
//!
//! Every credential can come from its environment variable, which is how the
//! CI workflows pass them.

use clap::Args;
use dbxops::DatabricksSettings;
use dbxops_security::Credentials;
use std::path::{Path, PathBuf};

pub use dbxops_logging::dbxops_home;

#[derive(Debug, Clone, Args)]
pub struct DatabricksArgs {
    /// Workspace host, with or without https://
    #[arg(long, env = "DATABRICKS_HOST")]
    pub host: String,

    /// Service principal application id
    #[arg(long, env = "CLIENT_ID")]
    pub client_id: String,

    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Azure AD tenant (Azure workspaces only)
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Base64 PEM bundle with certificate and private key
    #[arg(long, env = "AZURE_CLIENT_CERTIFICATE", hide_env_values = true)]
    pub client_certificate: Option<String>,

    #[arg(long, env = "AZURE_CLIENT_CERTIFICATE_PASSWORD", hide_env_values = true)]
    pub client_certificate_password: Option<String>,
}

impl DatabricksArgs {
    pub fn settings(&self) -> DatabricksSettings {
        DatabricksSettings::new(
            &self.host,
            Credentials {
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone(),
                tenant_id: self.tenant_id.clone(),
                client_certificate: self.client_certificate.clone(),
                client_certificate_password: self.client_certificate_password.clone(),
                ..Credentials::default()
            },
        )
    }
}

/// Resolve `path` against `$GITHUB_WORKSPACE` when it is relative and the
/// variable is set.
pub fn workspace_path(path: &Path) -> PathBuf {
    resolve_against(path, std::env::var_os("GITHUB_WORKSPACE").map(PathBuf::from))
}

fn resolve_against(path: &Path, root: Option<PathBuf>) -> PathBuf {
    match root {
        Some(root) if path.is_relative() && !root.as_os_str().is_empty() => root.join(path),
        _ => path.to_path_buf(),
    }
}

/// `~/.dbxops/benchmark.sqlite3`
pub fn default_benchmark_db() -> PathBuf {
    dbxops_home().join(dbxops_db::DEFAULT_DB_FILE)
}
