//! Azure Active Directory client credentials
//!
//! Supports the two confidential-client flows used from CI:
//! - client secret
//! - client certificate (signed client assertion, RFC 7523), given as PEM
//!   with a plain or PKCS#8-encrypted key, or as a PKCS#12 archive
//!
//! Uses raw HTTP requests against the v2.0 token endpoint (no SDK).

use crate::{check_status, pem, unix_now, AuthError, Result, DATABRICKS_SCOPE};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use p12_keystore::KeyStore;
use pkcs8::{EncryptedPrivateKeyInfo, LineEnding, SecretDocument};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Lifetime of a client assertion, in seconds.
const ASSERTION_LIFETIME_SECS: u64 = 600;

/// Token Response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// A client certificate with its private key.
#[derive(Clone)]
pub struct ClientCertificate {
    cert_der: Vec<u8>,
    key_pem: String,
}

impl std::fmt::Debug for ClientCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCertificate")
            .field("thumbprint", &self.thumbprint_s256())
            .finish_non_exhaustive()
    }
}

impl ClientCertificate {
    /// Decode `AZURE_CLIENT_CERTIFICATE`: base64 of either a PEM bundle or a
    /// PKCS#12 archive. `password` opens an encrypted PKCS#8 key or the
    /// archive.
    pub fn from_base64(encoded: &str, password: Option<&str>) -> Result<Self> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AuthError::InvalidCertificate(format!("not valid base64: {}", e)))?;

        if raw.windows(PEM_BEGIN.len()).any(|w| w == PEM_BEGIN.as_bytes()) {
            let text = String::from_utf8(raw)
                .map_err(|_| AuthError::InvalidCertificate("PEM bundle is not UTF-8".into()))?;
            Self::from_pem(&text, password)
        } else {
            Self::from_pkcs12(&raw, password)
        }
    }

    /// Certificate plus a `PRIVATE KEY`, `RSA PRIVATE KEY` or
    /// `ENCRYPTED PRIVATE KEY` block.
    pub fn from_pem(text: &str, password: Option<&str>) -> Result<Self> {
        let blocks = pem::blocks(text);
        let password = password.filter(|p| !p.is_empty());

        let cert = blocks
            .iter()
            .find(|b| b.label == "CERTIFICATE")
            .ok_or_else(|| AuthError::InvalidCertificate("no CERTIFICATE block".into()))?;
        let cert_der = cert
            .der()
            .map_err(|e| AuthError::InvalidCertificate(format!("bad certificate body: {}", e)))?;

        if let Some(encrypted) = blocks.iter().find(|b| b.label == "ENCRYPTED PRIVATE KEY") {
            let password = password.ok_or(AuthError::KeyPasswordRequired)?;
            let der = encrypted
                .der()
                .map_err(|e| AuthError::InvalidCertificate(format!("bad key body: {}", e)))?;
            let key = decrypt_pkcs8(&der, password)?;
            return Ok(Self {
                cert_der,
                key_pem: private_key_pem(&key)?,
            });
        }

        let key = blocks
            .iter()
            .find(|b| b.label == "PRIVATE KEY" || b.label == "RSA PRIVATE KEY")
            .ok_or_else(|| AuthError::InvalidCertificate("no PRIVATE KEY block".into()))?;
        if key.text.contains("Proc-Type: 4,ENCRYPTED") {
            return Err(AuthError::InvalidCertificate(
                "legacy encrypted RSA key; convert it with `openssl pkcs8 -topk8`".into(),
            ));
        }
        if password.is_some_and(|p| !p.trim().is_empty()) {
            tracing::warn!("Certificate password ignored; the private key is not encrypted");
        }

        Ok(Self {
            cert_der,
            key_pem: key.text.clone(),
        })
    }

    /// First key of a PKCS#12 archive with the leaf certificate of its chain.
    pub fn from_pkcs12(der: &[u8], password: Option<&str>) -> Result<Self> {
        let keystore = KeyStore::from_pkcs12(der, password.unwrap_or_default()).map_err(|e| {
            AuthError::InvalidCertificate(format!("cannot open PKCS#12 bundle: {}", e))
        })?;
        let (alias, chain) = keystore.private_key_chain().ok_or_else(|| {
            AuthError::InvalidCertificate("PKCS#12 bundle holds no private key".into())
        })?;
        let leaf = chain.chain().first().ok_or_else(|| {
            AuthError::InvalidCertificate(format!("no certificate for key '{}'", alias))
        })?;
        let key = SecretDocument::try_from(chain.key())
            .map_err(|e| AuthError::InvalidCertificate(format!("bad PKCS#12 key: {}", e)))?;
        tracing::debug!(alias, "Loaded client certificate from PKCS#12 bundle");

        Ok(Self {
            cert_der: leaf.as_der().to_vec(),
            key_pem: private_key_pem(&key)?,
        })
    }

    /// Base64url SHA-256 thumbprint of the DER certificate (`x5t#S256`).
    pub fn thumbprint_s256(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(&self.cert_der))
    }

    /// Sign a client assertion for `audience` (the token endpoint).
    pub fn client_assertion(&self, client_id: &str, audience: &str, now: u64) -> Result<String> {
        let mut header = Header::new(Algorithm::PS256);
        header.x5t_s256 = Some(self.thumbprint_s256());

        let claims = AssertionClaims {
            aud: audience.to_string(),
            iss: client_id.to_string(),
            sub: client_id.to_string(),
            jti: uuid::Uuid::new_v4().to_string(),
            nbf: now,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(self.key_pem.as_bytes())?;
        Ok(encode(&header, &claims, &key)?)
    }
}

const PEM_BEGIN: &str = "-----BEGIN ";

fn decrypt_pkcs8(der: &[u8], password: &str) -> Result<SecretDocument> {
    let info = EncryptedPrivateKeyInfo::try_from(der)
        .map_err(|e| AuthError::InvalidCertificate(format!("bad encrypted key: {}", e)))?;
    info.decrypt(password)
        .map_err(|e| AuthError::KeyDecryption(e.to_string()))
}

/// PKCS#8 DER as a `PRIVATE KEY` PEM block.
fn private_key_pem(key: &SecretDocument) -> Result<String> {
    let pem = key
        .to_pem("PRIVATE KEY", LineEnding::LF)
        .map_err(|e| AuthError::InvalidCertificate(format!("cannot encode key: {}", e)))?;
    Ok(pem.as_str().to_owned())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub aud: String,
    pub iss: String,
    pub sub: String,
    pub jti: String,
    pub nbf: u64,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone)]
pub enum AzureCredential {
    Secret(String),
    Certificate(ClientCertificate),
}

/// Azure Identity Provider
pub struct AzureProvider {
    tenant_id: String,
    client_id: String,
    credential: AzureCredential,
    authority: String,
    scope: String,
    http_client: reqwest::Client,
}

impl AzureProvider {
    pub fn new(tenant_id: String, client_id: String, credential: AzureCredential) -> Self {
        Self {
            tenant_id,
            client_id,
            credential,
            authority: DEFAULT_AUTHORITY.to_string(),
            scope: DATABRICKS_SCOPE.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Override the login authority (sovereign clouds, tests).
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }

    /// Request an access token with the configured credential.
    pub async fn access_token(&self) -> Result<String> {
        let endpoint = self.token_endpoint();

        let mut form: Vec<(&str, String)> = vec![
            ("client_id", self.client_id.clone()),
            ("grant_type", "client_credentials".to_string()),
            ("scope", self.scope.clone()),
        ];
        match &self.credential {
            AzureCredential::Secret(secret) => {
                tracing::debug!("Requesting Azure AD token with client secret");
                form.push(("client_secret", secret.clone()));
            }
            AzureCredential::Certificate(cert) => {
                tracing::debug!("Requesting Azure AD token with client certificate");
                let assertion = cert.client_assertion(&self.client_id, &endpoint, unix_now())?;
                form.push(("client_assertion_type", CLIENT_ASSERTION_TYPE.to_string()));
                form.push(("client_assertion", assertion));
            }
        }

        let response = self.http_client.post(&endpoint).form(&form).send().await?;
        let response = check_status(response).await?;
        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| AuthError::InvalidResponse {
                    url: endpoint.clone(),
                    reason: e.to_string(),
                })?;

        tracing::info!("Successfully obtained Azure AD access token");
        Ok(token.access_token)
    }
}
