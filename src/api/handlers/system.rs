//! Liveness endpoint for load balancers and orchestrators.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy`, or `draining` once shutdown has begun.
    status: String,
    /// Connections currently registered.
    connections: usize,
    timestamp: String,
    version: String,
}

/// `GET /health` — Hub health. Answers 503 while draining so traffic moves
/// elsewhere before sockets close.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Reports whether the hub accepts new connections, with the live connection count.",
    responses(
        (status = 200, description = "Accepting connections", body = HealthResponse),
        (status = 503, description = "Shutting down", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (status, label) = if state.hub.is_shutting_down() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else {
        (StatusCode::OK, "healthy")
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            connections: state.hub.registry().connection_count(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Root-level routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}
