//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` and the
//! WebSocket endpoint `/ws` live at the root.

pub mod dto;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI description of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "notify-hub", description = "Real-time notification delivery hub"),
    paths(
        handlers::system::health_handler,
        handlers::notifications::publish_notification,
        handlers::hub::hub_stats,
        handlers::hub::user_connections,
    ),
    components(schemas(
        dto::PublishNotificationRequest,
        dto::PublishNotificationResponse,
        dto::ConnectionSummary,
        dto::UserConnectionsResponse,
        crate::service::HubStats,
        crate::error::ErrorResponse,
    )),
    tags(
        (name = "Notifications", description = "Publishing to live connections"),
        (name = "Hub", description = "Registry diagnostics"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST endpoints (bounded by
/// `request_timeout`), the `/ws` upgrade endpoint, and shared middleware.
///
/// The timeout is applied to REST routes only; upgraded sockets outlive
/// any request deadline.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    let rest = build_router().layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        request_timeout,
    ));

    let app = Router::new().merge(rest).route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let app = app.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
