//! Application use cases. Orchestrate domain logic via ports.

pub mod dispatch_service;
pub mod message_sender;

pub use dispatch_service::DispatchService;
pub use message_sender::{MESSAGING_SCOPE, MessageSender};
