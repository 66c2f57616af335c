//! Firebase adapters: service-account credentials, Realtime Database, Cloud Messaging.

pub mod credentials;
pub mod fcm;
pub mod realtime_db;

pub use credentials::{DEFAULT_TOKEN_TIMEOUT, ServiceAccountKey, ServiceAccountTokenSource};
pub use fcm::{DEFAULT_FCM_BASE_URL, FcmAdapter};
pub use realtime_db::{DEFAULT_READ_TIMEOUT, RealtimeDbAdapter};
