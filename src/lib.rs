//! # notify-hub
//!
//! Real-time notification delivery over WebSockets.
//!
//! Clients open a persistent connection keyed by a user identity that the
//! surrounding session layer has already verified. Producers elsewhere in
//! the application publish events addressed to user ids; the hub fans each
//! event out to every live connection of every target user, with per
//! connection FIFO ordering and a drop-on-full policy that never blocks
//! the publisher.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)          Producers (in-process, REST)
//!     │                               │
//!     ├── Upgrade handler (ws/)       ├── Publish handler (api/)
//!     │                               │
//!     └──────────────┬────────────────┘
//!                    │
//!                   Hub (service/)
//!                    │
//!     ├── MessageRouter      ── fan-out, non-blocking enqueue
//!     ├── HeartbeatMonitor   ── probes, evicts silent connections
//!     │
//!     └── ConnectionRegistry (domain/) ── user → live connections
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod ws;
