//! Access token providers for the messaging API.
//!
//! A service account exchanges a signed RS256 assertion for a short-lived
//! OAuth access token (JWT bearer grant). Tokens are cached until shortly
//! before they expire.

use std::path::Path;

use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// Token endpoint used when neither configuration nor the key file name one
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scope required by the FCM HTTP v1 API
pub const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Cached tokens are refreshed this long before they expire
const REFRESH_MARGIN: SignedDuration = SignedDuration::from_secs(60);

/// Errors raised while obtaining an access token
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to read service account file '{path}': {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid service account key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Token endpoint returned {status}: {message}")]
    Exchange { status: u16, message: String },

    #[error("Token endpoint unreachable: {0}")]
    Network(String),
}

/// Supplies bearer tokens for outbound provider calls
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns an access token valid for `scope`
    async fn access_token(&self, scope: &str) -> Result<String, CredentialError>;

    /// Returns the provider name for logging
    fn name(&self) -> &'static str;
}

// ============================================================================
// Static token
// ============================================================================

/// Uses a pre-issued bearer token, for environments that mint tokens elsewhere
pub struct StaticCredentialProvider {
    token: String,
}

impl StaticCredentialProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn access_token(&self, _scope: &str) -> Result<String, CredentialError> {
        Ok(self.token.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

// ============================================================================
// Service account
// ============================================================================

/// Fields of a service account key file used for the token exchange
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Loads a key from a service account JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CredentialError::KeyFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, CredentialError> {
        let key: ServiceAccountKey = serde_json::from_str(content)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        if key.client_email.trim().is_empty() {
            return Err(CredentialError::InvalidKey(
                "client_email must not be empty".to_string(),
            ));
        }
        Ok(key)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AssertionClaims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

struct CachedToken {
    scope: String,
    token: String,
    expires_at: Timestamp,
}

/// Exchanges signed service account assertions for access tokens
pub struct ServiceAccountCredentialProvider {
    client: reqwest::Client,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    token_uri: String,
    cache: RwLock<Option<CachedToken>>,
}

impl ServiceAccountCredentialProvider {
    /// Creates a provider from a parsed key
    ///
    /// # Arguments
    /// * `client` - Shared HTTP client
    /// * `key` - Service account key
    /// * `token_uri` - Overrides the key file's token endpoint when set
    pub fn new(
        client: reqwest::Client,
        key: ServiceAccountKey,
        token_uri: Option<String>,
    ) -> Result<Self, CredentialError> {
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        let token_uri = token_uri
            .or_else(|| key.token_uri.clone())
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        Ok(Self {
            client,
            key,
            signing_key,
            token_uri,
            cache: RwLock::new(None),
        })
    }

    pub fn token_uri(&self) -> &str {
        &self.token_uri
    }

    /// Builds the signed JWT assertion presented to the token endpoint
    fn build_assertion(&self, scope: &str, now: Timestamp) -> Result<String, CredentialError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let iat = now.as_second();
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: scope.to_string(),
            aud: self.token_uri.clone(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        Ok(encode(&header, &claims, &self.signing_key)?)
    }

    async fn exchange(&self, scope: &str) -> Result<CachedToken, CredentialError> {
        let now = Timestamp::now();
        let assertion = self.build_assertion(scope, now)?;

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| CredentialError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CredentialError::Exchange {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Exchange {
                status: status.as_u16(),
                message: format!("malformed token response: {}", e),
            })?;

        Ok(CachedToken {
            scope: scope.to_string(),
            token: body.access_token,
            expires_at: now + SignedDuration::from_secs(body.expires_in),
        })
    }
}

fn is_fresh(cached: &CachedToken, scope: &str) -> bool {
    cached.scope == scope && Timestamp::now() + REFRESH_MARGIN < cached.expires_at
}

#[async_trait]
impl CredentialProvider for ServiceAccountCredentialProvider {
    async fn access_token(&self, scope: &str) -> Result<String, CredentialError> {
        if let Some(cached) = self.cache.read().await.as_ref()
            && is_fresh(cached, scope)
        {
            return Ok(cached.token.clone());
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref()
            && is_fresh(cached, scope)
        {
            return Ok(cached.token.clone());
        }

        tracing::debug!(
            client_email = %self.key.client_email,
            token_uri = %self.token_uri,
            "Exchanging service account assertion for access token"
        );
        let fresh = self.exchange(scope).await?;
        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }

    fn name(&self) -> &'static str {
        "service_account"
    }
}

/// Masks a token for display, keeping a short prefix and suffix
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let prefix: String = chars[..6].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{} ({} chars)", prefix, suffix, chars.len())
}
