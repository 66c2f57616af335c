//! In-memory adapters for tests and local development.
//!
//! Each fake counts its calls so callers can assert which steps ran.

use crate::domain::{AccessToken, DomainError, GatewayResponse, PushMessage};
use crate::ports::{CredentialPort, DeviceTokenPort, MessagingPort, PresencePort};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Default)]
struct UserRecord {
    status: Option<String>,
    token: Option<String>,
}

/// User store implementing both datastore ports.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, UserRecord>>,
    fail_presence: bool,
    fail_tokens: bool,
    presence_reads: AtomicUsize,
    token_reads: AtomicUsize,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every presence lookup fails with a datastore error.
    pub fn failing_presence(mut self) -> Self {
        self.fail_presence = true;
        self
    }

    /// Every token lookup fails with a datastore error.
    pub fn failing_tokens(mut self) -> Self {
        self.fail_tokens = true;
        self
    }

    pub fn with_user(self, user_id: &str, status: Option<&str>, token: Option<&str>) -> Self {
        if let Ok(mut users) = self.users.lock() {
            users.insert(
                user_id.to_string(),
                UserRecord {
                    status: status.map(str::to_string),
                    token: token.map(str::to_string),
                },
            );
        }
        self
    }

    pub fn presence_reads(&self) -> usize {
        self.presence_reads.load(Ordering::SeqCst)
    }

    pub fn token_reads(&self) -> usize {
        self.token_reads.load(Ordering::SeqCst)
    }

    fn record(&self, user_id: &str) -> Result<Option<UserRecord>, DomainError> {
        let users = self
            .users
            .lock()
            .map_err(|e| DomainError::Datastore(format!("store poisoned: {}", e)))?;
        Ok(users.get(user_id).cloned())
    }
}

#[async_trait::async_trait]
impl PresencePort for InMemoryUserStore {
    async fn get_presence(&self, user_id: &str) -> Result<Option<String>, DomainError> {
        self.presence_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_presence {
            return Err(DomainError::Datastore("presence lookup unavailable".into()));
        }
        Ok(self.record(user_id)?.and_then(|r| r.status))
    }
}

#[async_trait::async_trait]
impl DeviceTokenPort for InMemoryUserStore {
    async fn get_device_token(&self, user_id: &str) -> Result<Option<String>, DomainError> {
        self.token_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_tokens {
            return Err(DomainError::Datastore("token lookup unavailable".into()));
        }
        Ok(self.record(user_id)?.and_then(|r| r.token))
    }
}

/// Credential source that hands out a fixed token.
pub struct StaticCredentials {
    token: Option<String>,
    issued: AtomicUsize,
}

impl StaticCredentials {
    pub fn new(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            issued: AtomicUsize::new(0),
        }
    }

    /// Every exchange fails with a credential error.
    pub fn failing() -> Self {
        Self {
            token: None,
            issued: AtomicUsize::new(0),
        }
    }

    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CredentialPort for StaticCredentials {
    async fn access_token(&self, _scopes: &[&str]) -> Result<AccessToken, DomainError> {
        self.issued.fetch_add(1, Ordering::SeqCst);
        let token = self
            .token
            .clone()
            .ok_or_else(|| DomainError::Credential("invalid_grant: account disabled".into()))?;
        Ok(AccessToken {
            token,
            expires_at: Utc::now() + Duration::hours(1),
        })
    }
}

/// What the recording messenger answers with.
#[derive(Debug, Clone)]
pub enum GatewayReply {
    Status(u16, String),
    Timeout,
    Transport(String),
}

/// Messaging gateway that records every message it is handed.
pub struct RecordingMessenger {
    reply: GatewayReply,
    sent: Mutex<Vec<(PushMessage, String)>>,
}

impl RecordingMessenger {
    pub fn new(reply: GatewayReply) -> Self {
        Self {
            reply,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting() -> Self {
        Self::new(GatewayReply::Status(200, r#"{"name":"projects/p/messages/1"}"#.into()))
    }

    /// Messages received so far, paired with the bearer token used.
    pub fn sent(&self) -> Vec<(PushMessage, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MessagingPort for RecordingMessenger {
    async fn send(
        &self,
        message: &PushMessage,
        access_token: &str,
    ) -> Result<GatewayResponse, DomainError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((message.clone(), access_token.to_string()));
        }
        match &self.reply {
            GatewayReply::Status(status, body) => Ok(GatewayResponse {
                status: *status,
                body: body.clone(),
            }),
            GatewayReply::Timeout => Err(DomainError::Timeout("gateway".into())),
            GatewayReply::Transport(e) => Err(DomainError::Gateway(e.clone())),
        }
    }
}
