//! Diagnostic views of live connections.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::domain::{Connection, ConnectionId, ConnectionState};

/// One live connection as seen by the registry.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConnectionSummary {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Lifecycle state at snapshot time.
    pub state: ConnectionState,
    /// When the connection was established.
    pub created_at: DateTime<Utc>,
    /// Milliseconds since the last inbound frame.
    pub idle_ms: u64,
    /// Events accepted into the outbound queue.
    pub queued: u64,
    /// Events dropped on a full queue.
    pub dropped: u64,
}

impl From<&Connection> for ConnectionSummary {
    fn from(conn: &Connection) -> Self {
        let idle = conn.idle_for(Instant::now());
        Self {
            id: conn.id(),
            state: conn.state(),
            created_at: conn.created_at(),
            idle_ms: u64::try_from(idle.as_millis()).unwrap_or(u64::MAX),
            queued: conn.queued_count(),
            dropped: conn.dropped_count(),
        }
    }
}

/// Response of `GET /api/v1/hub/users/{user_id}/connections`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserConnectionsResponse {
    /// The queried user.
    pub user_id: String,
    /// Live connections at snapshot time.
    pub connections: Vec<ConnectionSummary>,
}
