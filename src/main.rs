//! Wiring & DI. Entry point: bootstrap adapters, inject into services, serve HTTP.
//! No business logic here; dispatch is delegated to DispatchService.

use anyhow::Context;
use dotenv::dotenv;
use offline_push::adapters::firebase::{
    FcmAdapter, RealtimeDbAdapter, ServiceAccountKey, ServiceAccountTokenSource,
};
use offline_push::adapters::http::{AppState, router};
use offline_push::ports::{CredentialPort, DeviceTokenPort, DispatchPort, MessagingPort, PresencePort};
use offline_push::shared::config::AppConfig;
use offline_push::usecases::{DispatchService, MessageSender};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load()?;
    let database_url = cfg
        .database_url
        .clone()
        .ok_or_else(|| anyhow::anyhow!("Set DATABASE_URL (env or .env) to the Realtime Database root URL"))?;

    // --- Credentials: a missing or invalid key file is fatal ---
    let http = reqwest::Client::new();
    let upstream_timeout = Duration::from_secs(cfg.upstream_timeout_secs_or_default());
    let key_path = cfg.service_account_file_or_default();
    let key = ServiceAccountKey::from_file(&key_path).await?;
    let cache_tokens = cfg.cache_access_tokens_or_default();
    let token_source = ServiceAccountTokenSource::new(key, cache_tokens)?
        .with_client(http.clone())
        .with_timeout(upstream_timeout);
    let project_id = cfg
        .project_id
        .clone()
        .unwrap_or_else(|| token_source.project_id().to_string());
    info!(
        path = %key_path,
        project_id = %project_id,
        cache_tokens,
        timeout_secs = upstream_timeout.as_secs(),
        "service account loaded"
    );
    let credentials: Arc<dyn CredentialPort> = Arc::new(token_source);

    // --- Datastore (one client serves both lookups) ---
    let db = Arc::new(
        RealtimeDbAdapter::new(&database_url, Some(Arc::clone(&credentials)))?
            .with_client(http.clone())
            .with_timeout(upstream_timeout),
    );
    let presence: Arc<dyn PresencePort> = Arc::clone(&db) as Arc<dyn PresencePort>;
    let tokens: Arc<dyn DeviceTokenPort> = db as Arc<dyn DeviceTokenPort>;
    info!(url = %database_url, "realtime database configured");

    // --- Messaging gateway ---
    let send_timeout = Duration::from_secs(cfg.send_timeout_secs_or_default());
    let fcm = FcmAdapter::new(&cfg.fcm_base_url_or_default(), &project_id, send_timeout)
        .with_client(http);
    info!(
        url = %fcm.send_url(),
        timeout_secs = send_timeout.as_secs(),
        "messaging gateway configured"
    );
    let messenger: Arc<dyn MessagingPort> = Arc::new(fcm);

    // --- Services ---
    let sender = MessageSender::new(credentials, messenger);
    let dispatcher: Arc<dyn DispatchPort> =
        Arc::new(DispatchService::new(presence, tokens, sender));

    let app = router(AppState {
        dispatcher,
        gateway_errors_as_502: cfg.gateway_errors_as_502_or_default(),
    });

    // --- Serve ---
    let bind_addr = cfg.bind_addr_or_default();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("bind {}", bind_addr))?;
    info!(addr = %bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
