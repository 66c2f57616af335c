//! Realtime Database REST adapter. Implements PresencePort and DeviceTokenPort.
//!
//! Reads `{database_url}/users/{user_id}/<key>.json`. JSON `null` means nothing
//! is stored at the path.

use crate::domain::DomainError;
use crate::ports::{CredentialPort, DeviceTokenPort, PresencePort};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DATABASE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/firebase.database",
    "https://www.googleapis.com/auth/userinfo.email",
];

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

const STATUS_KEY: &str = "-status";
const TOKEN_KEY: &str = "token";

pub struct RealtimeDbAdapter {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    /// `None` talks to the database unauthenticated (emulator, public rules).
    credentials: Option<Arc<dyn CredentialPort>>,
}

impl RealtimeDbAdapter {
    pub fn new(
        database_url: &str,
        credentials: Option<Arc<dyn CredentialPort>>,
    ) -> Result<Self, DomainError> {
        let base_url = Url::parse(database_url)
            .map_err(|e| DomainError::Config(format!("invalid database url {}: {}", database_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DomainError::Config(format!(
                "database url cannot be a base: {}",
                database_url
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            timeout: DEFAULT_READ_TIMEOUT,
            credentials,
        })
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Deadline for one read.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL of `/users/{user_id}/{key}.json`. The user id is encoded as one segment.
    fn user_key_url(&self, user_id: &str, key: &str) -> Result<Url, DomainError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DomainError::Config("database url cannot be a base".into()))?
            .pop_if_empty()
            .push("users")
            .push(user_id)
            .push(&format!("{}.json", key));
        Ok(url)
    }

    async fn read_user_key(&self, user_id: &str, key: &str) -> Result<Option<String>, DomainError> {
        let url = self.user_key_url(user_id, key)?;
        let mut request = self.client.get(url).timeout(self.timeout);
        if let Some(credentials) = &self.credentials {
            let token = credentials.access_token(&DATABASE_SCOPES).await?;
            request = request.query(&[("access_token", token.token.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DomainError::Datastore(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, key, "datastore returned error");
            return Err(DomainError::Datastore(format!(
                "datastore error {}: {}",
                status, text
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DomainError::Datastore(format!("parse response: {}", e)))?;
        debug!(user_id, key, "datastore read");

        Ok(match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }
}

#[async_trait::async_trait]
impl PresencePort for RealtimeDbAdapter {
    async fn get_presence(&self, user_id: &str) -> Result<Option<String>, DomainError> {
        self.read_user_key(user_id, STATUS_KEY).await
    }
}

#[async_trait::async_trait]
impl DeviceTokenPort for RealtimeDbAdapter {
    async fn get_device_token(&self, user_id: &str) -> Result<Option<String>, DomainError> {
        self.read_user_key(user_id, TOKEN_KEY).await
    }
}
