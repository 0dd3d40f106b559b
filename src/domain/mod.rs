//! Domain layer: identities, connections, the registry, and events.
//!
//! This module contains the hub's data model: user and connection
//! identity, the per-connection state machine with its bounded outbound
//! queue, the sharded connection registry, and the sequenced notification
//! events that flow through it.

pub mod connection;
pub mod connection_id;
pub mod connection_registry;
pub mod notification_event;
pub mod user_id;

pub use connection::{Connection, ConnectionState, EnqueueOutcome, MAX_QUEUE_CAPACITY, Outbound};
pub use connection_id::ConnectionId;
pub use connection_registry::ConnectionRegistry;
pub use notification_event::{NotificationEvent, PublishRequest};
pub use user_id::UserId;
