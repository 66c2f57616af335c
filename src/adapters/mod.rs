//! Infrastructure adapters. Implement ports.
//!
//! Firebase REST services, HTTP server, in-memory fakes. Map errors to DomainError.

pub mod firebase;
pub mod http;
pub mod memory;
