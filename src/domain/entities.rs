//! Domain entities. Request-scoped values for the dispatch pipeline.
//!
//! No HTTP/datastore types here; adapters map into these.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

pub const MSG_MISSING_PARAMS: &str = "Missing title, body, or user_id";
pub const MSG_USER_ONLINE: &str = "User is online, notification not sent.";
pub const MSG_STATUS_FAILED: &str = "Failed to check user status";
pub const MSG_TOKEN_NOT_FOUND: &str = "Device token not found for user";
pub const MSG_SENT: &str = "Notification sent successfully!";
pub const MSG_TIMEOUT: &str = "Timeout while sending notification.";

/// Incoming notification request. All three fields are present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub user_id: String,
}

impl NotificationRequest {
    /// Build a request from optional raw parameters.
    ///
    /// # Errors
    /// Returns `DomainError::Validation` if any field is missing or empty.
    pub fn new(
        title: Option<String>,
        body: Option<String>,
        user_id: Option<String>,
    ) -> Result<Self, DomainError> {
        match (non_empty(title), non_empty(body), non_empty(user_id)) {
            (Some(title), Some(body), Some(user_id)) => Ok(Self {
                title,
                body,
                user_id,
            }),
            _ => Err(DomainError::Validation(MSG_MISSING_PARAMS.to_string())),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// User presence as stored in the realtime datastore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Online,
    Offline,
    /// Lookup failed, value missing, or value not recognised.
    Unknown,
}

impl Presence {
    /// Only the literal strings `online` and `offline` are meaningful.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("online") => Presence::Online,
            Some("offline") => Presence::Offline,
            _ => Presence::Unknown,
        }
    }
}

/// Opaque delivery address of an installed client. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceToken(String);

impl DeviceToken {
    pub fn parse(raw: Option<String>) -> Option<Self> {
        raw.filter(|t| !t.is_empty()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Push message handed to the messaging gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub token: DeviceToken,
    pub title: String,
    pub body: String,
}

/// Raw gateway reply: HTTP status plus body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: String,
}

/// Short-lived bearer token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Tokens are refreshed this long before their actual expiry.
    pub const EXPIRY_SKEW_SECS: i64 = 60;

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(Self::EXPIRY_SKEW_SECS) >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Success,
    Info,
    Error,
}

/// Body returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub status: DispatchStatus,
    pub message: String,
}

impl DispatchResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: DispatchStatus::Error,
            message: message.into(),
        }
    }
}

/// How a dispatch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    UserOnline,
    StatusUnavailable,
    TokenNotFound,
    Sent,
    /// Gateway answered with a non-200 status; carries its body verbatim.
    GatewayRejected(String),
    Timeout,
    /// Credential exchange or transport failure.
    SendFailed(String),
}

impl DispatchOutcome {
    pub fn result(&self) -> DispatchResult {
        match self {
            DispatchOutcome::UserOnline => DispatchResult {
                status: DispatchStatus::Info,
                message: MSG_USER_ONLINE.to_string(),
            },
            DispatchOutcome::StatusUnavailable => DispatchResult::error(MSG_STATUS_FAILED),
            DispatchOutcome::TokenNotFound => DispatchResult::error(MSG_TOKEN_NOT_FOUND),
            DispatchOutcome::Sent => DispatchResult {
                status: DispatchStatus::Success,
                message: MSG_SENT.to_string(),
            },
            DispatchOutcome::GatewayRejected(body) => DispatchResult::error(body.clone()),
            DispatchOutcome::Timeout => DispatchResult::error(MSG_TIMEOUT),
            DispatchOutcome::SendFailed(description) => DispatchResult::error(description.clone()),
        }
    }
}
