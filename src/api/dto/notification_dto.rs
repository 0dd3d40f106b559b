//! Request and response bodies for the publish endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::service::PublishReceipt;

/// Body of `POST /api/v1/notifications`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PublishNotificationRequest {
    /// Users whose live connections should receive the payload.
    pub target_user_ids: Vec<String>,
    /// Notification body, forwarded to clients as serialized JSON text.
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

/// Response of `POST /api/v1/notifications`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublishNotificationResponse {
    /// Sequence number assigned to the event.
    pub sequence: u64,
    /// Distinct users addressed.
    pub targets: usize,
    /// When the hub accepted the event.
    pub published_at: DateTime<Utc>,
    /// Connections whose queue accepted the event.
    pub delivered: usize,
    /// Connections whose queue was full.
    pub dropped: usize,
}

impl From<PublishReceipt> for PublishNotificationResponse {
    fn from(receipt: PublishReceipt) -> Self {
        Self {
            sequence: receipt.sequence,
            targets: receipt.targets,
            published_at: receipt.published_at,
            delivered: receipt.route.delivered,
            dropped: receipt.route.dropped,
        }
    }
}
