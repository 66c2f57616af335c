//! Inbound port. The HTTP adapter calls into the application.

use crate::domain::{DispatchOutcome, DomainError, NotificationRequest};

/// Input port: dispatch one validated notification request.
#[async_trait::async_trait]
pub trait DispatchPort: Send + Sync {
    /// Run the pipeline for a single recipient.
    ///
    /// Expected failures (lookups, gateway, timeout) come back as a `DispatchOutcome`;
    /// `Err` is reserved for failures the pipeline does not classify.
    async fn dispatch(&self, request: NotificationRequest)
    -> Result<DispatchOutcome, DomainError>;
}
