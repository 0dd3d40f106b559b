//! WebSocket layer: upgrade handling, connection loops, wire frames.
//!
//! The WebSocket endpoint at `/ws?userId=...` upgrades a request into a
//! long-lived notification channel for that user.

pub mod connection;
pub mod handler;
pub mod messages;
