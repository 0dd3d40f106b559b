//! Read-only diagnostics over the connection registry.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ConnectionSummary, UserConnectionsResponse};
use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::{ErrorResponse, HubError};
use crate::service::HubStats;

/// `GET /hub/stats` — Aggregate registry and delivery counters.
#[utoipa::path(
    get,
    path = "/api/v1/hub/stats",
    tag = "Hub",
    summary = "Hub statistics",
    description = "Connection and user counts plus publish/delivery/drop totals. Diagnostic only.",
    responses(
        (status = 200, description = "Current counters", body = HubStats),
    )
)]
pub async fn hub_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.hub.stats())
}

/// `GET /hub/users/{user_id}/connections` — Snapshot of one user's
/// connections.
///
/// # Errors
///
/// Returns [`HubError::InvalidUserId`] for a malformed user id.
#[utoipa::path(
    get,
    path = "/api/v1/hub/users/{user_id}/connections",
    tag = "Hub",
    summary = "List a user's live connections",
    params(
        ("user_id" = String, Path, description = "User identity"),
    ),
    responses(
        (status = 200, description = "Connection snapshot", body = UserConnectionsResponse),
        (status = 400, description = "Malformed user id", body = ErrorResponse),
    )
)]
pub async fn user_connections(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, HubError> {
    let user_id = UserId::parse(user_id)?;
    let connections = state
        .hub
        .registry()
        .connections_for(&user_id)
        .iter()
        .map(|conn| ConnectionSummary::from(conn.as_ref()))
        .collect();
    Ok(Json(UserConnectionsResponse {
        user_id: user_id.to_string(),
        connections,
    }))
}

/// Hub diagnostic routes (mounted under `/api/v1`).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/hub/stats", get(hub_stats))
        .route("/hub/users/{user_id}/connections", get(user_connections))
}
