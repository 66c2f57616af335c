//! Push delivery: obtain a bearer token, submit the message, classify the reply.
//!
//! Single attempt. Every failure becomes a `DispatchOutcome`; nothing is retried.

use crate::domain::{DeviceToken, DispatchOutcome, DomainError, PushMessage};
use crate::ports::{CredentialPort, MessagingPort};
use std::sync::Arc;
use tracing::{error, info, warn};

/// OAuth scope required by the messaging gateway.
pub const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

pub struct MessageSender {
    credentials: Arc<dyn CredentialPort>,
    messenger: Arc<dyn MessagingPort>,
}

impl MessageSender {
    pub fn new(credentials: Arc<dyn CredentialPort>, messenger: Arc<dyn MessagingPort>) -> Self {
        Self {
            credentials,
            messenger,
        }
    }

    pub async fn send(&self, token: DeviceToken, title: &str, body: &str) -> DispatchOutcome {
        let access_token = match self.credentials.access_token(&[MESSAGING_SCOPE]).await {
            Ok(t) => t,
            Err(e) => {
                error!(error = %e, "failed to obtain messaging access token");
                return DispatchOutcome::SendFailed(e.to_string());
            }
        };

        let message = PushMessage {
            token,
            title: title.to_string(),
            body: body.to_string(),
        };

        match self.messenger.send(&message, &access_token.token).await {
            Ok(response) => {
                info!(status = response.status, body = %response.body, "gateway response");
                if response.status == 200 {
                    DispatchOutcome::Sent
                } else {
                    DispatchOutcome::GatewayRejected(response.body)
                }
            }
            Err(DomainError::Timeout(e)) => {
                warn!(error = %e, "timeout while sending notification");
                DispatchOutcome::Timeout
            }
            Err(e) => {
                error!(error = %e, "error sending notification");
                DispatchOutcome::SendFailed(e.to_string())
            }
        }
    }
}
