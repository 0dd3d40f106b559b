//! Axum WebSocket upgrade handler.
//!
//! Validation happens before the upgrade response is produced, so a
//! rejected request never touches the registry: missing or malformed
//! `userId` → 400, missing upgrade headers → 426, any other negotiation
//! failure → 500, shutdown in progress → 503.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::time::Instant;

use super::connection::run_connection;
use super::messages::CloseReason;
use crate::app_state::AppState;
use crate::domain::UserId;
use crate::error::HubError;
use crate::service::Hub;

/// Largest inbound message accepted from a client. Clients only send
/// control traffic, so this stays small.
pub const MAX_INBOUND_MESSAGE_BYTES: usize = 64 * 1024;

/// Query parameters of the upgrade endpoint.
#[derive(Debug, Deserialize)]
pub struct UpgradeParams {
    /// Identity resolved by the session layer.
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// `GET /ws?userId=...` — Upgrade HTTP connection to WebSocket.
pub async fn ws_handler(
    State(state): State<AppState>,
    params: Result<Query<UpgradeParams>, QueryRejection>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    match params {
        Ok(Query(params)) => state.hub.handle_upgrade(upgrade, params.user_id.as_deref()),
        Err(rejection) => HubError::InvalidUserId(rejection.body_text()).into_response(),
    }
}

/// Validates and accepts an upgrade on behalf of `hub`.
pub fn handle_upgrade(
    hub: &Arc<Hub>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    user_id: Option<&str>,
) -> Response {
    match accept(hub, upgrade, user_id) {
        Ok(response) => response,
        Err(err) => {
            match &err {
                HubError::NegotiationFailed(reason) => {
                    tracing::warn!(%reason, "websocket negotiation failed");
                }
                other => tracing::debug!(error = %other, "upgrade rejected"),
            }
            err.into_response()
        }
    }
}

fn accept(
    hub: &Arc<Hub>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    user_id: Option<&str>,
) -> Result<Response, HubError> {
    let user_id = UserId::parse(user_id.ok_or(HubError::MissingUserId)?)?;
    let ws = upgrade.map_err(classify_rejection)?;
    if hub.is_shutting_down() {
        return Err(HubError::ShuttingDown);
    }

    let requested_at = Instant::now();
    let tasks = hub.tasks().clone();
    let hub = Arc::clone(hub);

    Ok(ws
        .max_message_size(MAX_INBOUND_MESSAGE_BYTES)
        .on_failed_upgrade(|err| {
            tracing::warn!(error = %err, "websocket upgrade failed after handshake");
        })
        .on_upgrade(move |socket| {
            tasks.track_future(serve_socket(hub, socket, user_id, requested_at))
        }))
}

/// Maps extractor rejections onto the hub's error taxonomy.
fn classify_rejection(rejection: WebSocketUpgradeRejection) -> HubError {
    match &rejection {
        WebSocketUpgradeRejection::MethodNotGet(_)
        | WebSocketUpgradeRejection::InvalidConnectionHeader(_)
        | WebSocketUpgradeRejection::InvalidUpgradeHeader(_) => {
            HubError::UpgradeRequired(rejection.body_text())
        }
        _ => HubError::NegotiationFailed(rejection.body_text()),
    }
}

/// Registers the upgraded socket and runs it to completion.
async fn serve_socket(hub: Arc<Hub>, mut socket: WebSocket, user_id: UserId, requested_at: Instant) {
    let elapsed = requested_at.elapsed();
    if elapsed > hub.config().handshake_timeout {
        tracing::warn!(
            %user_id,
            elapsed_ms = elapsed.as_millis(),
            "websocket negotiation exceeded deadline, closing"
        );
        let _ = socket.send(CloseReason::HandshakeTimeout.frame()).await;
        return;
    }

    let (conn, outbound) = match hub.open_connection(user_id) {
        Ok(opened) => opened,
        Err(err) => {
            tracing::debug!(error = %err, "refusing upgraded socket");
            let _ = socket.send(CloseReason::ServerShutdown.frame()).await;
            return;
        }
    };

    run_connection(hub, socket, conn, outbound).await;
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::routing::get;
    use tower::ServiceExt;

    use super::*;
    use crate::config::HubConfig;

    fn app(hub: Arc<Hub>) -> Router {
        Router::new()
            .route("/ws", get(ws_handler))
            .with_state(AppState { hub })
    }

    fn upgrade_request(uri: &str) -> Request<Body> {
        let Ok(request) = Request::builder()
            .uri(uri)
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, "websocket")
            .header(header::SEC_WEBSOCKET_VERSION, "13")
            .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
        else {
            panic!("valid request");
        };
        request
    }

    async fn status_of(hub: Arc<Hub>, request: Request<Body>) -> StatusCode {
        response_of(hub, request).await.status()
    }

    async fn response_of(hub: Arc<Hub>, request: Request<Body>) -> Response {
        let Ok(response) = app(hub).oneshot(request).await else {
            panic!("router is infallible");
        };
        response
    }

    #[tokio::test]
    async fn missing_user_id_is_bad_request() {
        let hub = Hub::new(HubConfig::default());
        let status = status_of(Arc::clone(&hub), upgrade_request("/ws")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(hub.registry().is_empty());
    }

    #[tokio::test]
    async fn empty_user_id_is_bad_request() {
        let hub = Hub::new(HubConfig::default());
        let status = status_of(Arc::clone(&hub), upgrade_request("/ws?userId=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn plain_get_requires_upgrade() {
        let hub = Hub::new(HubConfig::default());
        let Ok(request) = Request::builder().uri("/ws?userId=u1").body(Body::empty()) else {
            panic!("valid request");
        };
        let response = response_of(Arc::clone(&hub), request).await;
        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
        assert_eq!(
            response.headers().get(header::UPGRADE).map(|v| v.as_bytes()),
            Some(&b"websocket"[..])
        );
        assert!(hub.registry().is_empty());
    }

    #[tokio::test]
    async fn unupgradable_connection_is_server_error() {
        // Without a hyper connection behind it the request cannot be
        // upgraded even though every header is present.
        let hub = Hub::new(HubConfig::default());
        let status = status_of(Arc::clone(&hub), upgrade_request("/ws?userId=u1")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(hub.registry().is_empty());
    }
}
