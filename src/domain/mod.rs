//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;

pub use entities::{
    AccessToken, DeviceToken, DispatchOutcome, DispatchResult, DispatchStatus, GatewayResponse,
    NotificationRequest, Presence, PushMessage,
};
pub use errors::DomainError;
