//! Workspace connection settings.

use crate::benchmark::Connector;
use crate::client::{DatabricksApi, DatabricksClient};
use crate::error::Result;
use async_trait::async_trait;
use dbxops_protocol::normalize_host;
use dbxops_security::aws::BENCHMARK_TOKEN_LIFETIME_SECS;
use dbxops_security::{AuthProvider, Credentials};
use std::sync::Arc;
use tracing::debug;

/// Host and service principal of one Databricks workspace.
#[derive(Debug, Clone)]
pub struct DatabricksSettings {
    pub host: String,
    pub credentials: Credentials,
}

impl DatabricksSettings {
    pub fn new(host: &str, credentials: Credentials) -> Self {
        Self {
            host: normalize_host(host),
            credentials,
        }
    }

    pub fn provider(&self) -> Result<AuthProvider> {
        Ok(AuthProvider::for_host(&self.host, &self.credentials)?)
    }

    /// A client holding a token fetched just now.
    pub async fn client(&self) -> Result<DatabricksClient> {
        DatabricksClient::connect(&self.host, &self.provider()?).await
    }

    /// Settings for a long benchmark: AWS tokens live for three hours.
    pub fn for_benchmark(mut self) -> Self {
        self.credentials.token_lifetime_secs = Some(BENCHMARK_TOKEN_LIFETIME_SECS);
        self
    }
}

/// Connects with a new token on every call.
pub struct DatabricksConnector {
    host: String,
    provider: AuthProvider,
}

impl DatabricksConnector {
    pub fn new(settings: &DatabricksSettings) -> Result<Self> {
        Ok(Self {
            host: settings.host.clone(),
            provider: settings.provider()?,
        })
    }
}

#[async_trait]
impl Connector for DatabricksConnector {
    async fn connect(&self) -> Result<Arc<dyn DatabricksApi>> {
        debug!(host = %self.host, "Fetching workspace token");
        let client = DatabricksClient::connect(&self.host, &self.provider).await?;
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbxops_protocol::CloudPlatform;

    fn creds() -> Credentials {
        Credentials {
            client_id: "client".into(),
            client_secret: Some("secret".into()),
            ..Credentials::default()
        }
    }

    #[test]
    fn test_host_is_normalized() {
        let settings = DatabricksSettings::new("dbc-1234.cloud.databricks.com/", creds());
        assert_eq!(settings.host, "https://dbc-1234.cloud.databricks.com");
        assert_eq!(settings.provider().unwrap().platform(), CloudPlatform::Aws);
    }

    #[test]
    fn test_benchmark_token_lifetime() {
        let settings = DatabricksSettings::new("dbc-1.cloud.databricks.com", creds()).for_benchmark();
        assert_eq!(settings.credentials.token_lifetime_secs, Some(10_800));
    }

    #[test]
    fn test_missing_tenant_on_azure() {
        let settings = DatabricksSettings::new("adb-1.2.azuredatabricks.net", creds());
        assert!(settings.provider().is_err());
        assert!(DatabricksConnector::new(&settings).is_err());
    }
}
