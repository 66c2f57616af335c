//! Dispatch pipeline: check presence -> resolve device token -> send.
//!
//! - Online users are skipped before any token lookup
//! - Lookup failures are logged and folded into "unknown"/"absent"
//! - Only offline users with a token reach the messaging gateway

use crate::domain::{DeviceToken, DispatchOutcome, DomainError, NotificationRequest, Presence};
use crate::ports::{DeviceTokenPort, DispatchPort, PresencePort};
use crate::usecases::MessageSender;
use std::sync::Arc;
use tracing::{error, info};

/// Dispatch service. Orchestrates the three external calls for one request.
pub struct DispatchService {
    presence: Arc<dyn PresencePort>,
    tokens: Arc<dyn DeviceTokenPort>,
    sender: MessageSender,
}

impl DispatchService {
    pub fn new(
        presence: Arc<dyn PresencePort>,
        tokens: Arc<dyn DeviceTokenPort>,
        sender: MessageSender,
    ) -> Self {
        Self {
            presence,
            tokens,
            sender,
        }
    }

    /// Status checker. Lookup errors are indistinguishable from unknown presence.
    pub async fn check_status(&self, user_id: &str) -> Presence {
        match self.presence.get_presence(user_id).await {
            Ok(raw) => {
                info!(user_id, status = ?raw, "user status");
                Presence::from_raw(raw.as_deref())
            }
            Err(e) => {
                error!(user_id, error = %e, "error checking user status");
                Presence::Unknown
            }
        }
    }

    /// Token resolver. Lookup errors and empty values both yield `None`.
    pub async fn resolve_token(&self, user_id: &str) -> Option<DeviceToken> {
        match self.tokens.get_device_token(user_id).await {
            Ok(raw) => {
                info!(user_id, found = raw.is_some(), "user device token");
                DeviceToken::parse(raw)
            }
            Err(e) => {
                error!(user_id, error = %e, "error fetching device token");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl DispatchPort for DispatchService {
    async fn dispatch(
        &self,
        request: NotificationRequest,
    ) -> Result<DispatchOutcome, DomainError> {
        info!(user_id = %request.user_id, "received notification request");

        match self.check_status(&request.user_id).await {
            Presence::Unknown => return Ok(DispatchOutcome::StatusUnavailable),
            Presence::Online => return Ok(DispatchOutcome::UserOnline),
            Presence::Offline => {}
        }

        let Some(token) = self.resolve_token(&request.user_id).await else {
            return Ok(DispatchOutcome::TokenNotFound);
        };

        Ok(self.sender.send(token, &request.title, &request.body).await)
    }
}
