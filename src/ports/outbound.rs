//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{AccessToken, DomainError, GatewayResponse, PushMessage};

/// Presence lookup in the realtime datastore.
#[async_trait::async_trait]
pub trait PresencePort: Send + Sync {
    /// Raw presence value for a user. `Ok(None)` when nothing is stored.
    async fn get_presence(&self, user_id: &str) -> Result<Option<String>, DomainError>;
}

/// Device token lookup in the realtime datastore.
#[async_trait::async_trait]
pub trait DeviceTokenPort: Send + Sync {
    /// Raw device token for a user. `Ok(None)` when nothing is stored.
    async fn get_device_token(&self, user_id: &str) -> Result<Option<String>, DomainError>;
}

/// Source of short-lived bearer tokens.
#[async_trait::async_trait]
pub trait CredentialPort: Send + Sync {
    /// Return a token valid for `scopes`, refreshing it if expired.
    async fn access_token(&self, scopes: &[&str]) -> Result<AccessToken, DomainError>;
}

/// Push messaging gateway.
#[async_trait::async_trait]
pub trait MessagingPort: Send + Sync {
    /// Submit one message. Any HTTP reply is `Ok`, whatever its status; transport
    /// failures are `Err`, with `DomainError::Timeout` when the deadline passed.
    async fn send(
        &self,
        message: &PushMessage,
        access_token: &str,
    ) -> Result<GatewayResponse, DomainError>;
}
