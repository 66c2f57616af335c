//! Application configuration. Credentials, endpoints, server address.

use serde::Deserialize;

pub const DEFAULT_SERVICE_ACCOUNT_FILE: &str = "./service-account.json";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    /// Path to the service-account JSON key. Read from SERVICE_ACCOUNT_FILE.
    #[serde(default)]
    pub service_account_file: Option<String>,

    /// Realtime Database root URL. Read from DATABASE_URL.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Listen address for the HTTP server. Read from OFFLINE_PUSH_BIND_ADDR.
    #[serde(default)]
    pub bind_addr: Option<String>,

    /// Overrides the project id taken from the service-account key.
    #[serde(default)]
    pub project_id: Option<String>,

    /// Messaging gateway origin (override for emulators/tests).
    #[serde(default)]
    pub fcm_base_url: Option<String>,

    /// Deadline for a single send request, in seconds.
    #[serde(default)]
    pub send_timeout_secs: Option<u64>,

    /// Deadline for a token exchange or a datastore read, in seconds.
    #[serde(default)]
    pub upstream_timeout_secs: Option<u64>,

    /// Reuse access tokens until they expire. Off = one exchange per request.
    #[serde(default)]
    pub cache_access_tokens: Option<bool>,

    /// Answer gateway rejections with 502 instead of 200.
    #[serde(default)]
    pub gateway_errors_as_502: Option<bool>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("OFFLINE_PUSH"));
        if let Ok(path) = std::env::var("OFFLINE_PUSH_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // SERVICE_ACCOUNT_FILE and DATABASE_URL are read without prefix so existing deployments keep working
        if let Ok(path) = std::env::var("SERVICE_ACCOUNT_FILE") {
            cfg.service_account_file = Some(path);
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.database_url = Some(url);
        }
        Ok(cfg)
    }

    pub fn service_account_file_or_default(&self) -> String {
        self.service_account_file
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVICE_ACCOUNT_FILE.to_string())
    }

    pub fn bind_addr_or_default(&self) -> String {
        self.bind_addr
            .clone()
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
    }

    pub fn fcm_base_url_or_default(&self) -> String {
        self.fcm_base_url
            .clone()
            .unwrap_or_else(|| crate::adapters::firebase::DEFAULT_FCM_BASE_URL.to_string())
    }

    /// Returns send timeout in seconds. Defaults to 10.
    pub fn send_timeout_secs_or_default(&self) -> u64 {
        self.send_timeout_secs.unwrap_or(DEFAULT_SEND_TIMEOUT_SECS)
    }

    pub fn upstream_timeout_secs_or_default(&self) -> u64 {
        self.upstream_timeout_secs
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS)
    }

    pub fn cache_access_tokens_or_default(&self) -> bool {
        self.cache_access_tokens.unwrap_or(true)
    }

    pub fn gateway_errors_as_502_or_default(&self) -> bool {
        self.gateway_errors_as_502.unwrap_or(false)
    }
}
