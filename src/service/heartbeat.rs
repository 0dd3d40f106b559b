//! Liveness probing and eviction of silent connections.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::domain::{ConnectionId, ConnectionRegistry, EnqueueOutcome};

/// Per-connection liveness bookkeeping, owned by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatRecord {
    /// Last inbound traffic observed for the connection.
    pub last_seen: Instant,
    /// Sweeps since `last_seen` moved.
    pub missed_probes: u32,
}

/// Counts from one monitor sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections examined.
    pub checked: usize,
    /// Probes placed on outbound queues.
    pub probed: usize,
    /// Connections evicted for silence.
    pub evicted: usize,
}

/// Periodically probes every registered connection and evicts the ones
/// that have been silent for longer than the timeout.
///
/// Every action on a connection is non-blocking (atomic reads, `try_send`,
/// a cancellation signal), so one stuck peer cannot stall a sweep.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    timeout: Duration,
    records: HashMap<ConnectionId, HeartbeatRecord>,
}

impl HeartbeatMonitor {
    /// Creates a monitor sweeping every `interval` and evicting after
    /// `timeout` of silence.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, interval: Duration, timeout: Duration) -> Self {
        Self {
            registry,
            interval,
            timeout,
            records: HashMap::new(),
        }
    }

    /// Returns the record tracked for a connection, if any.
    #[must_use]
    pub fn record(&self, id: ConnectionId) -> Option<HeartbeatRecord> {
        self.records.get(&id).copied()
    }

    /// Runs sweeps on a fixed interval until `stop` is cancelled.
    pub async fn run(mut self, stop: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            timeout_secs = self.timeout.as_secs(),
            "heartbeat monitor started"
        );

        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.sweep(Instant::now());
                    if report.checked > 0 {
                        tracing::debug!(
                            checked = report.checked,
                            probed = report.probed,
                            evicted = report.evicted,
                            "heartbeat sweep"
                        );
                    }
                }
            }
        }

        tracing::debug!("heartbeat monitor stopped");
    }

    /// Performs one sweep as of `now`.
    pub fn sweep(&mut self, now: Instant) -> SweepReport {
        let ids = self.registry.all_connection_ids();
        let live: HashSet<ConnectionId> = ids.iter().copied().collect();
        self.records.retain(|id, _| live.contains(id));

        let mut report = SweepReport::default();
        for id in ids {
            // Closed between the snapshot and now.
            let Some(conn) = self.registry.get(id) else {
                continue;
            };
            report.checked += 1;

            let seen = conn.last_seen();
            let record = *self
                .records
                .entry(id)
                .and_modify(|record| {
                    if seen > record.last_seen {
                        record.last_seen = seen;
                        record.missed_probes = 0;
                    } else {
                        record.missed_probes = record.missed_probes.saturating_add(1);
                    }
                })
                .or_insert(HeartbeatRecord {
                    last_seen: seen,
                    missed_probes: 0,
                });

            let idle = now.saturating_duration_since(record.last_seen);
            if idle >= self.timeout {
                conn.begin_draining();
                self.registry.unregister(id);
                self.records.remove(&id);
                report.evicted += 1;
                tracing::info!(
                    conn_id = %id,
                    user_id = %conn.user_id(),
                    idle_secs = idle.as_secs(),
                    missed_probes = record.missed_probes,
                    "heartbeat timeout, connection evicted"
                );
                continue;
            }

            if conn.try_enqueue_probe() == EnqueueOutcome::Queued {
                report.probed += 1;
            }
        }
        report
    }
}
