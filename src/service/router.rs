//! Fan-out of notification events to live connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::domain::{ConnectionRegistry, EnqueueOutcome, NotificationEvent};

/// Outcome of routing one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RouteReport {
    /// Connections found across all targets at routing time.
    pub connections: usize,
    /// Connections whose queue accepted the event.
    pub delivered: usize,
    /// Connections whose queue was full.
    pub dropped: usize,
    /// Connections that were already draining or closed.
    pub closed: usize,
}

/// Routes each event to every live connection of every addressed user.
///
/// Enqueueing is always non-blocking: a slow consumer costs that consumer
/// the event and nothing else. Per-connection ordering follows from each
/// connection having a FIFO queue drained by a single writer.
#[derive(Debug)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl MessageRouter {
    /// Creates a router over the given registry.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self {
            registry,
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Enqueues the event on every connection of every target user.
    ///
    /// Users without live connections are skipped silently; nothing is kept
    /// for them.
    pub fn route(&self, event: &Arc<NotificationEvent>) -> RouteReport {
        let mut report = RouteReport::default();

        for user_id in event.target_user_ids() {
            for conn in self.registry.connections_for(user_id) {
                report.connections += 1;
                match conn.try_enqueue_event(Arc::clone(event)) {
                    EnqueueOutcome::Queued => report.delivered += 1,
                    EnqueueOutcome::Dropped => {
                        report.dropped += 1;
                        tracing::trace!(
                            conn_id = %conn.id(),
                            %user_id,
                            sequence = event.sequence(),
                            "outbound queue full, event dropped"
                        );
                    }
                    EnqueueOutcome::Closed => report.closed += 1,
                }
            }
        }

        self.delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
        report
    }

    /// Total events accepted into connection queues.
    #[must_use]
    pub fn delivered_total(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Total events dropped on full queues.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
