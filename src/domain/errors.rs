//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    /// Carries the caller-facing message verbatim.
    #[error("{0}")]
    Validation(String),

    #[error("Datastore error: {0}")]
    Datastore(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
