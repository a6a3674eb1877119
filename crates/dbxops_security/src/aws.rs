//! Databricks on AWS: OAuth machine-to-machine, exchanged for a workspace token.

use crate::{check_status, AuthError, Result};
use dbxops_protocol::normalize_host;
use serde::{Deserialize, Serialize};

/// Token lifetime used by the CI tooling.
pub const OPS_TOKEN_LIFETIME_SECS: u64 = 600;

/// Token lifetime used by the benchmark runner (three hours).
pub const BENCHMARK_TOKEN_LIFETIME_SECS: u64 = 10_800;

#[derive(Debug, Deserialize)]
struct OidcTokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
struct CreateTokenRequest<'a> {
    lifetime_seconds: u64,
    comment: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateTokenResponse {
    token_value: String,
}

pub struct AwsProvider {
    host: String,
    client_id: String,
    client_secret: String,
    lifetime_seconds: u64,
    http_client: reqwest::Client,
}

impl AwsProvider {
    pub fn new(host: &str, client_id: String, client_secret: String) -> Self {
        Self {
            host: normalize_host(host),
            client_id,
            client_secret,
            lifetime_seconds: OPS_TOKEN_LIFETIME_SECS,
            http_client: reqwest::Client::new(),
        }
    }

    pub fn with_lifetime(mut self, lifetime_seconds: u64) -> Self {
        self.lifetime_seconds = lifetime_seconds;
        self
    }

    /// OAuth M2M bearer token for the workspace.
    async fn oauth_token(&self) -> Result<String> {
        let url = format!("{}/oidc/v1/token", self.host);
        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "all-apis")])
            .send()
            .await?;
        let body: OidcTokenResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse {
                url,
                reason: e.to_string(),
            })?;
        Ok(body.access_token)
    }

    /// Mint a workspace token valid for the configured lifetime.
    pub async fn access_token(&self) -> Result<String> {
        let oauth = self.oauth_token().await?;

        let url = format!("{}/api/2.0/token/create", self.host);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(oauth)
            .json(&CreateTokenRequest {
                lifetime_seconds: self.lifetime_seconds,
                comment: "dbxops",
            })
            .send()
            .await?;
        let body: CreateTokenResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse {
                url,
                reason: e.to_string(),
            })?;

        tracing::info!(
            lifetime_seconds = self.lifetime_seconds,
            "Created Databricks workspace token"
        );
        Ok(body.token_value)
    }
}
