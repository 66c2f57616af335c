//! Service-account token source. Implements CredentialPort.
//!
//! Signs an RS256 JWT assertion with the service account's private key and
//! exchanges it at the key's `token_uri` for a bearer token. Tokens are cached
//! per scope set and refreshed when they expire. Each scope set refreshes under
//! its own lock, so a slow exchange for one never holds up another.

use crate::domain::{AccessToken, DomainError};
use crate::ports::CredentialPort;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Lifetime requested for each assertion (the maximum the token endpoint accepts).
const ASSERTION_TTL_SECS: i64 = 3600;
pub const DEFAULT_TOKEN_TIMEOUT: StdDuration = StdDuration::from_secs(10);

type TokenSlot = Arc<AsyncMutex<Option<AccessToken>>>;

/// Fields of a service-account JSON key file used by the token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    pub token_uri: String,
}

impl ServiceAccountKey {
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DomainError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            DomainError::Config(format!(
                "read service account file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, DomainError> {
        serde_json::from_str(raw)
            .map_err(|e| DomainError::Config(format!("parse service account key: {}", e)))
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct ServiceAccountTokenSource {
    client: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    timeout: StdDuration,
    cache_enabled: bool,
    cache: Mutex<HashMap<String, TokenSlot>>,
}

impl ServiceAccountTokenSource {
    /// Build a token source. Fails if the private key is not valid RSA PEM.
    pub fn new(key: ServiceAccountKey, cache_enabled: bool) -> Result<Self, DomainError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| DomainError::Config(format!("invalid service account private key: {}", e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            key,
            encoding_key,
            timeout: DEFAULT_TOKEN_TIMEOUT,
            cache_enabled,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Deadline for one token exchange.
    pub fn with_timeout(mut self, timeout: StdDuration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a caller-provided HTTP client (shared pool, custom proxy/TLS settings).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn project_id(&self) -> &str {
        &self.key.project_id
    }

    fn sign_assertion(&self, scope: &str) -> Result<String, DomainError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: scope.to_string(),
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| DomainError::Credential(format!("sign assertion: {}", e)))
    }

    async fn exchange(&self, scope: &str) -> Result<AccessToken, DomainError> {
        let assertion = self.sign_assertion(scope)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .timeout(self.timeout)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| DomainError::Credential(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "token endpoint returned error");
            return Err(DomainError::Credential(format!(
                "token endpoint error {}: {}",
                status, text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Credential(format!("parse token response: {}", e)))?;

        debug!(expires_in = token.expires_in, "access token refreshed");

        let expires_at = Duration::try_seconds(token.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                DomainError::Credential(format!(
                    "token endpoint returned invalid expires_in: {}",
                    token.expires_in
                ))
            })?;

        Ok(AccessToken {
            token: token.access_token,
            expires_at,
        })
    }

    fn slot(&self, scope: &str) -> Result<TokenSlot, DomainError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| DomainError::Credential("token cache poisoned".into()))?;
        Ok(Arc::clone(cache.entry(scope.to_string()).or_default()))
    }
}

#[async_trait::async_trait]
impl CredentialPort for ServiceAccountTokenSource {
    async fn access_token(&self, scopes: &[&str]) -> Result<AccessToken, DomainError> {
        let scope = scopes.join(" ");
        if !self.cache_enabled {
            return self.exchange(&scope).await;
        }

        let slot = self.slot(&scope)?;
        let mut cached = slot.lock().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref() {
            if !token.is_expired(Utc::now()) {
                return Ok(token.clone());
            }
        }
        let token = self.exchange(&scope).await?;
        info!(scope = %scope, "cached new access token");
        *cached = Some(token.clone());
        Ok(token)
    }
}
