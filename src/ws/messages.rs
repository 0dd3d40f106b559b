//! Wire frames written to clients.
//!
//! Notification payloads travel verbatim: UTF-8 payloads become text
//! frames, anything else a binary frame. Heartbeat probes are WebSocket
//! ping frames, which browsers and most client libraries answer with a pong
//! on their own.

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, close_code};

use crate::domain::Outbound;

/// Payload carried by heartbeat ping frames.
pub const PROBE_PAYLOAD: &[u8] = b"hb";

/// Why the server is closing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The hub is shutting down.
    ServerShutdown,
    /// The connection was drained for any other reason.
    Draining,
    /// The upgraded socket arrived after the negotiation deadline.
    HandshakeTimeout,
}

impl CloseReason {
    /// Builds the close frame sent to the peer.
    #[must_use]
    pub fn frame(self) -> Message {
        let (code, reason) = match self {
            Self::ServerShutdown => (close_code::AWAY, "server shutting down"),
            Self::Draining => (close_code::NORMAL, "connection closing"),
            Self::HandshakeTimeout => (close_code::POLICY, "handshake timeout"),
        };
        Message::Close(Some(CloseFrame {
            code,
            reason: Utf8Bytes::from_static(reason),
        }))
    }
}

/// Converts a queued item into the frame written to the socket.
#[must_use]
pub fn to_frame(item: &Outbound) -> Message {
    match item {
        Outbound::Event(event) => payload_frame(event.payload()),
        Outbound::Probe => Message::Ping(Bytes::from_static(PROBE_PAYLOAD)),
    }
}

fn payload_frame(payload: &Bytes) -> Message {
    match std::str::from_utf8(payload) {
        Ok(text) => Message::text(text.to_owned()),
        Err(_) => Message::binary(payload.clone()),
    }
}
