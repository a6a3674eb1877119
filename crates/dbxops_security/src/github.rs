//! GitHub App authentication and the contents API.

use crate::{check_status, unix_now, AuthError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

pub const GITHUB_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("dbxops/", env!("CARGO_PKG_VERSION"));

/// App JWTs are valid for ten minutes.
const APP_JWT_LIFETIME_SECS: u64 = 600;

#[derive(Debug, Serialize, Deserialize)]
pub struct AppClaims {
    pub iat: u64,
    pub exp: u64,
    pub iss: String,
}

/// A GitHub App identity: app id plus its RSA private key (PEM).
pub struct GithubApp {
    app_id: String,
    private_key_pem: String,
}

impl GithubApp {
    pub fn new(app_id: impl Into<String>, private_key_pem: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            private_key_pem: private_key_pem.into(),
        }
    }

    /// RS256 JWT `{iat, exp = iat + 600, iss = app_id}`.
    pub fn jwt(&self, now: u64) -> Result<String> {
        let claims = AppClaims {
            iat: now,
            exp: now + APP_JWT_LIFETIME_SECS,
            iss: self.app_id.clone(),
        };
        let key = EncodingKey::from_rsa_pem(self.private_key_pem.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }
}

#[derive(Debug, Deserialize)]
pub struct Installation {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct InstallationToken {
    token: String,
}

/// Metadata of an existing file in a repository.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentInfo {
    pub sha: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutContentRequest<'a> {
    branch: &'a str,
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

/// Thin client over the GitHub REST API, authenticated with one bearer token.
pub struct GithubClient {
    api_url: String,
    token: String,
    http_client: reqwest::Client,
}

impl GithubClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_url(GITHUB_API_URL, token)
    }

    pub fn with_api_url(api_url: &str, token: impl Into<String>) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.into(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Exchange an App JWT for an installation token scoped to `org/repo`.
    pub async fn for_installation(api_url: &str, app: &GithubApp, org: &str, repo: &str) -> Result<Self> {
        let app_client = Self::with_api_url(api_url, app.jwt(unix_now())?);
        let installation = app_client.installation(org, repo).await?;
        tracing::debug!(installation_id = installation.id, "Found GitHub App installation");
        let token = app_client.installation_token(installation.id).await?;
        Ok(Self::with_api_url(api_url, token))
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("X-GitHub-Api-Version", API_VERSION)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
    }

    pub async fn installation(&self, org: &str, repo: &str) -> Result<Installation> {
        let url = format!("{}/repos/{}/{}/installation", self.api_url, org, repo);
        let response = self.request(reqwest::Method::GET, &url).send().await?;
        check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse {
                url,
                reason: e.to_string(),
            })
    }

    pub async fn installation_token(&self, installation_id: i64) -> Result<String> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation_id
        );
        let response = self.request(reqwest::Method::POST, &url).send().await?;
        let body: InstallationToken = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse {
                url,
                reason: e.to_string(),
            })?;
        Ok(body.token)
    }

    /// Look up a file; `None` when it does not exist.
    pub async fn get_content(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<Option<ContentInfo>> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            self.api_url, org, repo, path, branch
        );
        let response = self.request(reqwest::Method::GET, &url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("Path '{}' does not exist", url);
            return Ok(None);
        }
        let info = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse {
                url,
                reason: e.to_string(),
            })?;
        Ok(Some(info))
    }

    /// Create or replace a file. `sha` must be the current blob sha when the
    /// file already exists.
    #[allow(clippy::too_many_arguments)]
    pub async fn put_content(
        &self,
        org: &str,
        repo: &str,
        branch: &str,
        path: &str,
        content: &[u8],
        message: &str,
        sha: Option<&str>,
    ) -> Result<()> {
        let url = format!("{}/repos/{}/{}/contents/{}", self.api_url, org, repo, path);
        let body = PutContentRequest {
            branch,
            message,
            content: STANDARD.encode(content),
            sha,
        };
        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(&body)
            .send()
            .await?;
        check_status(response).await?;
        tracing::info!("Committed '{}' to {}/{}@{}", path, org, repo, branch);
        Ok(())
    }
}
