mod common;

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use common::{KEY_JSON, body_json, get as get_app, loopback_client, spawn_stub};
use offline_push::adapters::firebase::{
    FcmAdapter, RealtimeDbAdapter, ServiceAccountKey, ServiceAccountTokenSource,
};
use offline_push::adapters::http::{AppState, router};
use offline_push::adapters::memory::StaticCredentials;
use offline_push::domain::{DeviceToken, DomainError, PushMessage};
use offline_push::ports::{CredentialPort, DeviceTokenPort, MessagingPort, PresencePort};
use offline_push::usecases::{DispatchService, MESSAGING_SCOPE, MessageSender};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────
// Realtime Database stub
// ─────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct DbStub {
    data: HashMap<String, Value>,
    access_tokens: Mutex<Vec<Option<String>>>,
}

async fn db_read(
    State(stub): State<Arc<DbStub>>,
    Path((user_id, key)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    stub.access_tokens
        .lock()
        .unwrap()
        .push(query.get("access_token").cloned());
    if user_id == "slow" {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    if user_id == "broken" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Permission denied"})),
        );
    }
    let path = format!("{}/{}", user_id, key);
    let value = stub.data.get(&path).cloned().unwrap_or(Value::Null);
    (StatusCode::OK, Json(value))
}

async fn spawn_db(data: &[(&str, Value)]) -> (String, Arc<DbStub>) {
    let stub = Arc::new(DbStub {
        data: data
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
        ..Default::default()
    });
    let app = Router::new()
        .route("/users/{user_id}/{key}", get(db_read))
        .with_state(stub.clone());
    (spawn_stub(app).await, stub)
}

#[tokio::test]
async fn test_realtime_db_reads_presence_and_token() {
    let (url, stub) = spawn_db(&[
        ("u1/-status.json", json!("offline")),
        ("u1/token.json", json!("abc123")),
    ])
    .await;
    let db = RealtimeDbAdapter::new(&url, None)
        .unwrap()
        .with_client(loopback_client());

    assert_eq!(db.get_presence("u1").await.unwrap().as_deref(), Some("offline"));
    assert_eq!(
        db.get_device_token("u1").await.unwrap().as_deref(),
        Some("abc123")
    );
    assert!(db.get_presence("nobody").await.unwrap().is_none());
    assert!(stub.access_tokens.lock().unwrap().iter().all(Option::is_none));
}

#[tokio::test]
async fn test_realtime_db_non_string_value_is_json_text() {
    let (url, _stub) = spawn_db(&[("u1/-status.json", json!({"state": "online"}))]).await;
    let db = RealtimeDbAdapter::new(&url, None)
        .unwrap()
        .with_client(loopback_client());

    assert_eq!(
        db.get_presence("u1").await.unwrap().as_deref(),
        Some(r#"{"state":"online"}"#)
    );
}

#[tokio::test]
async fn test_realtime_db_error_status_is_datastore_error() {
    let (url, _stub) = spawn_db(&[]).await;
    let db = RealtimeDbAdapter::new(&url, None)
        .unwrap()
        .with_client(loopback_client());

    let err = db.get_presence("broken").await.unwrap_err();
    assert!(matches!(err, DomainError::Datastore(ref m) if m.contains("401")));
}

#[tokio::test]
async fn test_realtime_db_read_timeout_is_datastore_error() {
    let (url, _stub) = spawn_db(&[("slow/-status.json", json!("offline"))]).await;
    let db = RealtimeDbAdapter::new(&url, None)
        .unwrap()
        .with_client(loopback_client())
        .with_timeout(Duration::from_millis(200));

    let result = tokio::time::timeout(Duration::from_secs(3), db.get_presence("slow"))
        .await
        .expect("read should give up at its own deadline");

    assert!(matches!(result, Err(DomainError::Datastore(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_realtime_db_sends_access_token() {
    let (url, stub) = spawn_db(&[("u1/token.json", json!("abc123"))]).await;
    let creds: Arc<dyn CredentialPort> = Arc::new(StaticCredentials::new("ya29.db"));
    let db = RealtimeDbAdapter::new(&url, Some(creds))
        .unwrap()
        .with_client(loopback_client());

    db.get_device_token("u1").await.unwrap();

    assert_eq!(
        stub.access_tokens.lock().unwrap().as_slice(),
        &[Some("ya29.db".to_string())]
    );
}

// ─────────────────────────────────────────────────────────────────────────
// Messaging gateway stub
// ─────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FcmStub {
    requests: Mutex<Vec<(String, Option<String>, Value)>>,
    reply_status: u16,
    delay: Option<Duration>,
}

async fn fcm_send(
    State(stub): State<Arc<FcmStub>>,
    Path(project): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> (StatusCode, String) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    stub.requests.lock().unwrap().push((project, auth, payload));
    if let Some(delay) = stub.delay {
        tokio::time::sleep(delay).await;
    }
    let status = StatusCode::from_u16(stub.reply_status).unwrap();
    if status == StatusCode::OK {
        (status, r#"{"name":"projects/demo-project/messages/0:1"}"#.to_string())
    } else {
        (status, r#"{"error":{"status":"INVALID_ARGUMENT"}}"#.to_string())
    }
}

async fn spawn_fcm(reply_status: u16, delay: Option<Duration>) -> (String, Arc<FcmStub>) {
    let stub = Arc::new(FcmStub {
        reply_status,
        delay,
        ..Default::default()
    });
    let app = Router::new()
        .route("/v1/projects/{project}/messages:send", post(fcm_send))
        .with_state(stub.clone());
    (spawn_stub(app).await, stub)
}

fn message() -> PushMessage {
    PushMessage {
        token: DeviceToken::parse(Some("abc123".into())).unwrap(),
        title: "Hi".into(),
        body: "Test".into(),
    }
}

#[tokio::test]
async fn test_fcm_posts_payload_with_bearer() {
    let (url, stub) = spawn_fcm(200, None).await;
    let fcm = FcmAdapter::new(&url, "demo-project", Duration::from_secs(10))
        .with_client(loopback_client());

    let response = fcm.send(&message(), "ya29.fcm").await.unwrap();

    assert_eq!(response.status, 200);
    let requests = stub.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let (project, auth, payload) = &requests[0];
    assert_eq!(project, "demo-project");
    assert_eq!(auth.as_deref(), Some("Bearer ya29.fcm"));
    assert_eq!(
        payload,
        &json!({"message": {"token": "abc123", "notification": {"title": "Hi", "body": "Test"}}})
    );
}

#[tokio::test]
async fn test_fcm_returns_rejection_body() {
    let (url, _stub) = spawn_fcm(400, None).await;
    let fcm = FcmAdapter::new(&url, "demo-project", Duration::from_secs(10))
        .with_client(loopback_client());

    let response = fcm.send(&message(), "t").await.unwrap();

    assert_eq!(response.status, 400);
    assert_eq!(response.body, r#"{"error":{"status":"INVALID_ARGUMENT"}}"#);
}

#[tokio::test]
async fn test_fcm_timeout() {
    let (url, _stub) = spawn_fcm(200, Some(Duration::from_secs(5))).await;
    let fcm = FcmAdapter::new(&url, "demo-project", Duration::from_millis(200))
        .with_client(loopback_client());

    let err = fcm.send(&message(), "t").await.unwrap_err();

    assert!(matches!(err, DomainError::Timeout(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_fcm_connection_refused_is_gateway_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let fcm = FcmAdapter::new(&format!("http://{}", addr), "p", Duration::from_secs(2))
        .with_client(loopback_client());

    let err = fcm.send(&message(), "t").await.unwrap_err();

    assert!(matches!(err, DomainError::Gateway(_)), "got {:?}", err);
}

// ─────────────────────────────────────────────────────────────────────────
// Token endpoint stub
// ─────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct TokenStub {
    forms: Mutex<Vec<HashMap<String, String>>>,
    expires_in: i64,
    fail: bool,
}

/// Scope claim of the signed assertion (signature not checked).
fn assertion_scope(form: &HashMap<String, String>) -> String {
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    let data = jsonwebtoken::decode::<Value>(
        &form["assertion"],
        &jsonwebtoken::DecodingKey::from_secret(b""),
        &validation,
    )
    .unwrap();
    data.claims["scope"].as_str().unwrap_or_default().to_string()
}

/// Scope the stub token endpoint never answers for.
const STALLED_SCOPE: &str = "https://example.com/auth/stalled";

async fn token_exchange(
    State(stub): State<Arc<TokenStub>>,
    Form(form): Form<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if assertion_scope(&form) == STALLED_SCOPE {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
    let n = {
        let mut forms = stub.forms.lock().unwrap();
        forms.push(form);
        forms.len()
    };
    if stub.fail {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "access_token": format!("ya29.token-{}", n),
            "expires_in": stub.expires_in,
            "token_type": "Bearer"
        })),
    )
}

async fn token_source(
    expires_in: i64,
    fail: bool,
    cache: bool,
) -> (ServiceAccountTokenSource, Arc<TokenStub>) {
    let stub = Arc::new(TokenStub {
        expires_in,
        fail,
        ..Default::default()
    });
    let app = Router::new()
        .route("/token", post(token_exchange))
        .with_state(stub.clone());
    let url = spawn_stub(app).await;

    let mut key = ServiceAccountKey::from_json(KEY_JSON).unwrap();
    key.token_uri = format!("{}/token", url);
    let source = ServiceAccountTokenSource::new(key, cache)
        .unwrap()
        .with_client(loopback_client());
    (source, stub)
}

#[tokio::test]
async fn test_token_exchange_uses_jwt_bearer_grant() {
    let (source, stub) = token_source(3600, false, true).await;

    let token = source.access_token(&[MESSAGING_SCOPE]).await.unwrap();

    assert_eq!(token.token, "ya29.token-1");
    let forms = stub.forms.lock().unwrap();
    assert_eq!(
        forms[0].get("grant_type").map(String::as_str),
        Some("urn:ietf:params:oauth:grant-type:jwt-bearer")
    );
    let assertion = forms[0].get("assertion").unwrap();
    assert_eq!(assertion.split('.').count(), 3);
}

#[tokio::test]
async fn test_cached_token_is_reused() {
    let (source, stub) = token_source(3600, false, true).await;

    let first = source.access_token(&[MESSAGING_SCOPE]).await.unwrap();
    let second = source.access_token(&[MESSAGING_SCOPE]).await.unwrap();

    assert_eq!(first.token, second.token);
    assert_eq!(stub.forms.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_tokens_are_cached_per_scope() {
    let (source, stub) = token_source(3600, false, true).await;

    let messaging = source.access_token(&[MESSAGING_SCOPE]).await.unwrap();
    let other = source.access_token(&["scope-a", "scope-b"]).await.unwrap();

    assert_ne!(messaging.token, other.token);
    assert_eq!(stub.forms.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    // Lifetime shorter than the refresh skew: every call sees an expired token.
    let (source, _stub) = token_source(30, false, true).await;

    let first = source.access_token(&[MESSAGING_SCOPE]).await.unwrap();
    let second = source.access_token(&[MESSAGING_SCOPE]).await.unwrap();

    assert_eq!(first.token, "ya29.token-1");
    assert_eq!(second.token, "ya29.token-2");
}

#[tokio::test]
async fn test_cache_disabled_exchanges_every_time() {
    let (source, stub) = token_source(3600, false, false).await;

    source.access_token(&[MESSAGING_SCOPE]).await.unwrap();
    source.access_token(&[MESSAGING_SCOPE]).await.unwrap();

    assert_eq!(stub.forms.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_stalled_token_endpoint_times_out() {
    let (source, _stub) = token_source(3600, false, true).await;
    let source = source.with_timeout(Duration::from_millis(200));

    let result = tokio::time::timeout(Duration::from_secs(3), source.access_token(&[STALLED_SCOPE]))
        .await
        .expect("exchange should give up at its own deadline");

    assert!(matches!(result, Err(DomainError::Credential(_))), "got {:?}", result);
}

#[tokio::test]
async fn test_stalled_scope_does_not_block_other_scopes() {
    let (source, stub) = token_source(3600, false, true).await;
    let source = Arc::new(source.with_timeout(Duration::from_secs(60)));

    let stalled = {
        let source = Arc::clone(&source);
        tokio::spawn(async move { source.access_token(&[STALLED_SCOPE]).await })
    };
    // Let the stalled exchange reach the stub before asking for another scope.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let token = tokio::time::timeout(Duration::from_secs(3), source.access_token(&[MESSAGING_SCOPE]))
        .await
        .expect("messaging scope must not wait on the stalled exchange")
        .unwrap();

    assert!(token.token.starts_with("ya29.token-"));
    assert!(!stalled.is_finished());
    assert_eq!(stub.forms.lock().unwrap().len(), 1);
    stalled.abort();
}

#[tokio::test]
async fn test_out_of_range_expires_in_is_credential_error() {
    let (source, _stub) = token_source(i64::MAX, false, true).await;

    let err = source.access_token(&[MESSAGING_SCOPE]).await.unwrap_err();

    assert!(matches!(err, DomainError::Credential(ref m) if m.contains("expires_in")));
}

#[tokio::test]
async fn test_token_endpoint_error_is_credential_error() {
    let (source, _stub) = token_source(3600, true, true).await;

    let err = source.access_token(&[MESSAGING_SCOPE]).await.unwrap_err();

    assert!(matches!(err, DomainError::Credential(ref m) if m.contains("invalid_grant")));
}

// ─────────────────────────────────────────────────────────────────────────
// Full pipeline over HTTP stubs
// ─────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_offline_user() {
    let (db_url, db_stub) = spawn_db(&[
        ("u1/-status.json", json!("offline")),
        ("u1/token.json", json!("abc123")),
    ])
    .await;
    let (fcm_url, fcm_stub) = spawn_fcm(200, None).await;
    let (source, token_stub) = token_source(3600, false, true).await;
    let credentials: Arc<dyn CredentialPort> = Arc::new(source);

    let db = Arc::new(
        RealtimeDbAdapter::new(&db_url, Some(Arc::clone(&credentials)))
            .unwrap()
            .with_client(loopback_client()),
    );
    let presence: Arc<dyn PresencePort> = db.clone();
    let tokens: Arc<dyn DeviceTokenPort> = db;
    let messenger: Arc<dyn MessagingPort> = Arc::new(
        FcmAdapter::new(&fcm_url, "demo-project", Duration::from_secs(10))
            .with_client(loopback_client()),
    );
    let sender = MessageSender::new(credentials, messenger);
    let app = router(AppState {
        dispatcher: Arc::new(DispatchService::new(presence, tokens, sender)),
        gateway_errors_as_502: false,
    });

    let response = get_app(app, "/send_notification?title=Hi&body=Test&user_id=u1").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"status": "success", "message": "Notification sent successfully!"})
    );
    let requests = fcm_stub.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].1.as_deref(), Some("Bearer ya29.token-2"));
    // One token for the database scopes (reused by both reads), one for messaging.
    assert_eq!(token_stub.forms.lock().unwrap().len(), 2);
    let db_tokens = db_stub.access_tokens.lock().unwrap();
    assert_eq!(db_tokens.len(), 2);
    assert!(db_tokens.iter().all(|t| t.as_deref() == Some("ya29.token-1")));
}
