//! Host-based selection of the Databricks credential flow.

use crate::aws::{AwsProvider, OPS_TOKEN_LIFETIME_SECS};
use crate::azure::{AzureCredential, AzureProvider, ClientCertificate, DEFAULT_AUTHORITY};
use crate::{AuthError, Result};
use dbxops_protocol::CloudPlatform;

/// Service principal settings, usually read from the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub tenant_id: Option<String>,
    /// Base64 PEM bundle (`AZURE_CLIENT_CERTIFICATE`).
    pub client_certificate: Option<String>,
    pub client_certificate_password: Option<String>,
    /// Lifetime of AWS workspace tokens.
    pub token_lifetime_secs: Option<u64>,
    /// Azure login authority override.
    pub authority: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("has_secret", &self.client_secret.is_some())
            .field("has_certificate", &self.certificate().is_some())
            .finish()
    }
}

impl Credentials {
    /// The certificate, if one is configured and not blank.
    fn certificate(&self) -> Option<&str> {
        self.client_certificate
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

pub enum AuthProvider {
    Azure(AzureProvider),
    Aws(AwsProvider),
}

impl AuthProvider {
    pub fn for_host(host: &str, credentials: &Credentials) -> Result<Self> {
        if credentials.client_id.trim().is_empty() {
            return Err(AuthError::MissingCredential("CLIENT_ID"));
        }

        match CloudPlatform::from_host(host) {
            CloudPlatform::Azure => {
                let tenant_id = credentials
                    .tenant_id
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or(AuthError::MissingCredential("AZURE_TENANT_ID"))?;

                let credential = match credentials.certificate() {
                    Some(encoded) => {
                        let password = credentials
                            .client_certificate_password
                            .as_deref()
                            .map(str::trim);
                        AzureCredential::Certificate(ClientCertificate::from_base64(
                            encoded, password,
                        )?)
                    }
                    None => AzureCredential::Secret(
                        credentials
                            .client_secret
                            .clone()
                            .ok_or(AuthError::MissingCredential("CLIENT_SECRET"))?,
                    ),
                };

                let authority = credentials
                    .authority
                    .clone()
                    .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string());
                Ok(AuthProvider::Azure(
                    AzureProvider::new(tenant_id, credentials.client_id.clone(), credential)
                        .with_authority(authority),
                ))
            }
            CloudPlatform::Aws => {
                let secret = credentials
                    .client_secret
                    .clone()
                    .ok_or(AuthError::MissingCredential("CLIENT_SECRET"))?;
                Ok(AuthProvider::Aws(
                    AwsProvider::new(host, credentials.client_id.clone(), secret).with_lifetime(
                        credentials
                            .token_lifetime_secs
                            .unwrap_or(OPS_TOKEN_LIFETIME_SECS),
                    ),
                ))
            }
        }
    }

    pub fn platform(&self) -> CloudPlatform {
        match self {
            AuthProvider::Azure(_) => CloudPlatform::Azure,
            AuthProvider::Aws(_) => CloudPlatform::Aws,
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        match self {
            AuthProvider::Azure(p) => p.access_token().await,
            AuthProvider::Aws(p) => p.access_token().await,
        }
    }
}
