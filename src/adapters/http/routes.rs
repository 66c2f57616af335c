//! Routes: `GET /send_notification` and `GET /health`.
//!
//! Maps `DispatchOutcome`s to HTTP statuses. Handler panics are caught and
//! answered with the generic error body.

use crate::domain::{DispatchOutcome, DispatchResult, NotificationRequest};
use crate::ports::DispatchPort;
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, warn};

pub struct AppState {
    pub dispatcher: Arc<dyn DispatchPort>,
    /// Answer gateway rejections with 502 instead of 200.
    pub gateway_errors_as_502: bool,
}

/// Query parameters of `/send_notification`. A repeated key keeps its first value.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SendNotificationParams {
    pub title: Option<String>,
    pub body: Option<String>,
    pub user_id: Option<String>,
}

impl SendNotificationParams {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "title" => &mut params.title,
                "body" => &mut params.body,
                "user_id" => &mut params.user_id,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/send_notification", get(send_notification))
        .route("/health", get(health))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn send_notification(
    State(state): State<Arc<AppState>>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> (StatusCode, Json<DispatchResult>) {
    let params = match pairs {
        Ok(Query(pairs)) => SendNotificationParams::from_pairs(pairs),
        Err(e) => {
            warn!(error = %e, "malformed query string");
            SendNotificationParams::default()
        }
    };
    let SendNotificationParams {
        title,
        body,
        user_id,
    } = params;

    let request = match NotificationRequest::new(title, body, user_id) {
        Ok(r) => r,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(DispatchResult::error(e.to_string())),
            );
        }
    };

    match state.dispatcher.dispatch(request).await {
        Ok(outcome) => (
            status_for(&outcome, state.gateway_errors_as_502),
            Json(outcome.result()),
        ),
        Err(e) => {
            error!(error = %e, "error in send_notification route");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(DispatchResult::error(e.to_string())),
            )
        }
    }
}

fn status_for(outcome: &DispatchOutcome, gateway_errors_as_502: bool) -> StatusCode {
    match outcome {
        DispatchOutcome::StatusUnavailable | DispatchOutcome::TokenNotFound => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        DispatchOutcome::GatewayRejected(_) if gateway_errors_as_502 => StatusCode::BAD_GATEWAY,
        _ => StatusCode::OK,
    }
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "internal error".to_string()
    };
    error!(panic = %message, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(DispatchResult::error(message)),
    )
        .into_response()
}
