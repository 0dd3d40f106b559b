//! Publish endpoint for external event producers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{PublishNotificationRequest, PublishNotificationResponse};
use crate::app_state::AppState;
use crate::domain::{PublishRequest, UserId};
use crate::error::{ErrorResponse, HubError};

/// `POST /notifications` — Publish a notification to live connections.
///
/// # Errors
///
/// Returns [`HubError::InvalidRequest`] when no target is given and
/// [`HubError::InvalidUserId`] when a target is malformed.
#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    tag = "Notifications",
    summary = "Publish a notification",
    description = "Fans the payload out to every live connection of each target user. Fire-and-forget: offline users are skipped and slow connections drop the event.",
    request_body = PublishNotificationRequest,
    responses(
        (status = 202, description = "Notification routed", body = PublishNotificationResponse),
        (status = 400, description = "Invalid targets", body = ErrorResponse),
    )
)]
pub async fn publish_notification(
    State(state): State<AppState>,
    Json(req): Json<PublishNotificationRequest>,
) -> Result<impl IntoResponse, HubError> {
    if req.target_user_ids.is_empty() {
        return Err(HubError::InvalidRequest(
            "target_user_ids must not be empty".to_string(),
        ));
    }
    let targets = req
        .target_user_ids
        .into_iter()
        .map(UserId::parse)
        .collect::<Result<Vec<_>, _>>()?;
    let payload = serde_json::to_vec(&req.payload)
        .map_err(|e| HubError::Internal(format!("payload serialization: {e}")))?;

    let receipt = state.hub.publish(PublishRequest::new(targets, payload));
    Ok((
        StatusCode::ACCEPTED,
        Json(PublishNotificationResponse::from(receipt)),
    ))
}

/// Notification routes (mounted under `/api/v1`).
pub fn routes() -> Router<AppState> {
    Router::new().route("/notifications", post(publish_notification))
}
