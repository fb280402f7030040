//! HTTP Surface
//!
//! `POST /webhook` for GitHub deliveries plus liveness endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::dispatcher::{Delivery, DispatchError, Dispatcher, EVENT_HEADER};
use crate::signature::SIGNATURE_HEADER;

/// Shared state for webhook handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// Main service router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/webhook", post(handle_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness-only router for the standalone health server
pub fn health_router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
}

async fn root() -> &'static str {
    "uwularpy webhook server is running!"
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "uwularpy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// Failures reach GitHub as a status and a generic body; detail stays in
// the server logs.
impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match status {
            StatusCode::UNAUTHORIZED => "Invalid signature",
            _ => "Error processing webhook",
        };
        (status, body).into_response()
    }
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, DispatchError> {
    match state
        .dispatcher
        .handle(
            header(&headers, EVENT_HEADER),
            header(&headers, SIGNATURE_HEADER),
            body,
        )
        .await
    {
        Ok(Delivery::Ignored(reason)) => {
            debug!(reason, "Delivery ignored");
            Ok("Webhook processed")
        }
        Ok(Delivery::Completed(outcome)) => {
            info!(pr = outcome.pr_number, url = %outcome.pr_url, "Delivery handled");
            Ok("Webhook processed")
        }
        Err(e) => {
            if !matches!(e, DispatchError::Pipeline(_)) {
                info!(status = %e.status(), error = %e, "Delivery rejected");
            }
            Err(e)
        }
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
