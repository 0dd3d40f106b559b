//! One live WebSocket connection and its lifecycle state machine.
//!
//! A [`Connection`] owns the sending half of its bounded outbound queue, a
//! drop counter, a last-seen instant and a drain signal. The receiving half
//! of the queue belongs to the connection's write loop, which makes that
//! loop the single writer for the socket.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use utoipa::ToSchema;

use super::{ConnectionId, NotificationEvent, UserId};

/// Largest outbound queue a connection will allocate. Tokio channels refuse
/// capacities near their semaphore limit, so larger requests are clamped.
pub const MAX_QUEUE_CAPACITY: usize = 1 << 20;

/// Lifecycle state of a connection.
///
/// Transitions only move forward: `connecting → open → draining → closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    /// Upgrade negotiated, not yet registered.
    Connecting = 0,
    /// Registered and receiving events.
    Open = 1,
    /// Closing: no new events accepted, pending writes being flushed.
    Draining = 2,
    /// Terminal. Resources released.
    Closed = 3,
}

impl ConnectionState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Draining,
            _ => Self::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Draining => "draining",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Item carried by a connection's outbound queue.
///
/// Application events and heartbeat probes share the queue so that both
/// follow the same per-connection write order.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Notification to forward to the client.
    Event(Arc<NotificationEvent>),
    /// Liveness probe (sent as a WebSocket ping frame).
    Probe,
}

/// Result of a non-blocking enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The item is in the queue and will be written in order.
    Queued,
    /// The queue was full; the item was discarded for this connection.
    Dropped,
    /// The connection no longer accepts items.
    Closed,
}

/// A live transport session bound to exactly one user.
///
/// Shared as `Arc<Connection>` between the registry and the connection's
/// own task pair. All mutation goes through atomics, so accessors are safe
/// to call from the router and the heartbeat monitor concurrently.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    epoch: Instant,
    last_seen_ms: AtomicU64,
    state: AtomicU8,
    outbound: mpsc::Sender<Outbound>,
    queued: AtomicU64,
    dropped: AtomicU64,
    drain: CancellationToken,
}

impl Connection {
    /// Creates a connection in the `connecting` state with a fresh id and a
    /// bounded outbound queue of `queue_capacity` slots, clamped to
    /// `1..=`[`MAX_QUEUE_CAPACITY`].
    ///
    /// Returns the connection together with the receiving half of its queue,
    /// which must be handed to the write loop.
    #[must_use]
    pub fn new(user_id: UserId, queue_capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(queue_capacity.clamp(1, MAX_QUEUE_CAPACITY));
        let conn = Self {
            id: ConnectionId::new(),
            user_id,
            created_at: Utc::now(),
            epoch: Instant::now(),
            last_seen_ms: AtomicU64::new(0),
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            outbound: tx,
            queued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            drain: CancellationToken::new(),
        };
        (conn, rx)
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the owning user.
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the wall-clock creation time.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns how many events were discarded because the queue was full.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns how many events were accepted into the queue.
    #[must_use]
    pub fn queued_count(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Attempts to enqueue an event without waiting.
    ///
    /// A full queue drops the incoming event for this connection only and
    /// bumps the drop counter; what is already queued is kept, so the client
    /// sees the earliest events in publish order.
    pub fn try_enqueue_event(&self, event: Arc<NotificationEvent>) -> EnqueueOutcome {
        let outcome = self.try_enqueue(Outbound::Event(event));
        match outcome {
            EnqueueOutcome::Queued => {
                self.queued.fetch_add(1, Ordering::Relaxed);
            }
            EnqueueOutcome::Dropped => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            EnqueueOutcome::Closed => {}
        }
        outcome
    }

    /// Attempts to enqueue a liveness probe without waiting.
    ///
    /// A probe that does not fit is simply skipped; it is not counted as a
    /// dropped event.
    pub fn try_enqueue_probe(&self) -> EnqueueOutcome {
        self.try_enqueue(Outbound::Probe)
    }

    fn try_enqueue(&self, item: Outbound) -> EnqueueOutcome {
        if self.state() != ConnectionState::Open {
            return EnqueueOutcome::Closed;
        }
        match self.outbound.try_send(item) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => EnqueueOutcome::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.begin_draining();
                EnqueueOutcome::Closed
            }
        }
    }

    /// Records inbound traffic from the peer.
    pub fn touch(&self) {
        let elapsed = Instant::now().saturating_duration_since(self.epoch);
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.last_seen_ms.fetch_max(ms, Ordering::AcqRel);
    }

    /// Returns the instant of the most recent inbound traffic (or creation).
    #[must_use]
    pub fn last_seen(&self) -> Instant {
        self.epoch + Duration::from_millis(self.last_seen_ms.load(Ordering::Acquire))
    }

    /// Returns how long the peer has been silent as of `now`.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen())
    }

    /// Moves `connecting → open`. Returns `false` if the connection was not
    /// in `connecting`.
    pub fn mark_open(&self) -> bool {
        self.transition(ConnectionState::Connecting, ConnectionState::Open)
    }

    /// Moves `open → draining` and fires the drain signal.
    ///
    /// The signal fires on every call so a connection that never opened
    /// still releases its loops. Returns `true` only for the call that
    /// performed the transition.
    pub fn begin_draining(&self) -> bool {
        let moved = self.transition(ConnectionState::Open, ConnectionState::Draining);
        self.drain.cancel();
        moved
    }

    /// Moves the connection to `closed`, passing through `draining` when
    /// needed. Returns `true` for exactly one caller over the connection's
    /// lifetime; that caller owns the final cleanup.
    pub fn mark_closed(&self) -> bool {
        self.begin_draining();
        self.transition(ConnectionState::Draining, ConnectionState::Closed)
    }

    /// Returns `true` once draining has been requested.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.drain.is_cancelled()
    }

    /// Resolves when draining has been requested.
    pub fn drained(&self) -> WaitForCancellationFuture<'_> {
        self.drain.cancelled()
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
