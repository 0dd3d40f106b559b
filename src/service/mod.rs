//! Service layer: fan-out, liveness monitoring, and the hub itself.

pub mod heartbeat;
pub mod hub;
pub mod router;

pub use heartbeat::{HeartbeatMonitor, HeartbeatRecord, SweepReport};
pub use hub::{Hub, HubStats, PublishReceipt, global, init};
pub use router::{MessageRouter, RouteReport};
