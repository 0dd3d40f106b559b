//! Hub error types with HTTP status code mapping.
//!
//! [`HubError`] is the central error type for the hub. Each variant maps to
//! a specific HTTP status code and structured JSON error response. Delivery
//! failures (full queues, closed sockets) are deliberately absent: they are
//! absorbed by the router and counted, never surfaced to a publisher.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid user id: must not be empty",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`HubError`] code ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category      | HTTP Status                      |
/// |-----------|---------------|----------------------------------|
/// | 1000–1999 | Input         | 400 Bad Request                  |
/// | 2000–2999 | Negotiation   | 426 Upgrade Required / 500       |
/// | 3000–3999 | Server        | 500 / 503                        |
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The `userId` query parameter was absent.
    #[error("missing userId query parameter")]
    MissingUserId,

    /// The supplied user identity is empty or malformed.
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    /// Request body or parameters failed validation.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request did not carry a usable upgrade negotiation header.
    #[error("upgrade required: {0}")]
    UpgradeRequired(String),

    /// The transport upgrade could not be negotiated.
    #[error("websocket negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The hub is draining connections and refuses new ones.
    #[error("hub is shutting down")]
    ShuttingDown,

    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::MissingUserId => 1001,
            Self::InvalidUserId(_) => 1002,
            Self::InvalidRequest(_) => 1003,
            Self::UpgradeRequired(_) => 2001,
            Self::NegotiationFailed(_) => 2002,
            Self::Internal(_) => 3000,
            Self::ShuttingDown => 3001,
            Self::InvalidConfig(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingUserId | Self::InvalidUserId(_) | Self::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::UpgradeRequired(_) => StatusCode::UPGRADE_REQUIRED,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            Self::NegotiationFailed(_) | Self::InvalidConfig(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let upgrade_required = matches!(self, Self::UpgradeRequired(_));
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        if upgrade_required {
            response
                .headers_mut()
                .insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        }
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_map_to_bad_request() {
        assert_eq!(HubError::MissingUserId.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            HubError::InvalidUserId("empty".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upgrade_and_negotiation_statuses() {
        assert_eq!(
            HubError::UpgradeRequired("no header".to_string()).status_code(),
            StatusCode::UPGRADE_REQUIRED
        );
        assert_eq!(
            HubError::NegotiationFailed("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            HubError::ShuttingDown.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn into_response_carries_status() {
        let response = HubError::MissingUserId.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::UPGRADE).is_none());
    }

    #[test]
    fn upgrade_required_names_protocol() {
        let response = HubError::UpgradeRequired("no header".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
        assert_eq!(
            response.headers().get(header::UPGRADE).map(HeaderValue::as_bytes),
            Some(&b"websocket"[..])
        );
    }
}
