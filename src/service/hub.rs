//! Composition root for the notification hub.
//!
//! [`Hub`] wires the [`ConnectionRegistry`], [`MessageRouter`] and
//! [`HeartbeatMonitor`] together and owns their lifecycle. The rest of the
//! application talks to it through two entry points:
//! [`Hub::handle_upgrade`] and [`Hub::publish`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use axum::extract::ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use utoipa::ToSchema;

use super::heartbeat::HeartbeatMonitor;
use super::router::{MessageRouter, RouteReport};
use crate::config::HubConfig;
use crate::domain::{
    Connection, ConnectionRegistry, NotificationEvent, Outbound, PublishRequest, UserId,
};
use crate::error::HubError;

static GLOBAL_HUB: OnceLock<Arc<Hub>> = OnceLock::new();

/// Returns the process-wide hub, constructing and starting it on first
/// call.
///
/// Later calls return the same instance and ignore `config`. Must be called
/// from within a Tokio runtime.
pub fn init(config: HubConfig) -> Arc<Hub> {
    let hub = GLOBAL_HUB.get_or_init(|| Hub::new(config));
    hub.start();
    Arc::clone(hub)
}

/// Returns the process-wide hub if [`init`] has run.
#[must_use]
pub fn global() -> Option<Arc<Hub>> {
    GLOBAL_HUB.get().map(Arc::clone)
}

/// Receipt returned to a publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    /// Sequence number assigned to the event.
    pub sequence: u64,
    /// Distinct users addressed.
    pub targets: usize,
    /// When the event was created.
    pub published_at: DateTime<Utc>,
    /// Per-connection routing outcome.
    pub route: RouteReport,
}

/// Aggregate counters for operational visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct HubStats {
    /// Registered connections.
    pub connections: usize,
    /// Users with at least one connection.
    pub users: usize,
    /// Events published since start.
    pub published: u64,
    /// Events accepted into connection queues.
    pub delivered: u64,
    /// Events dropped on full queues.
    pub dropped: u64,
    /// Whether shutdown has begun.
    pub shutting_down: bool,
}

/// The notification hub.
#[derive(Debug)]
pub struct Hub {
    config: HubConfig,
    registry: Arc<ConnectionRegistry>,
    router: MessageRouter,
    sequence: AtomicU64,
    published: AtomicU64,
    tasks: TaskTracker,
    monitor_started: AtomicBool,
    monitor_stop: CancellationToken,
    shutting_down: AtomicBool,
}

impl Hub {
    /// Builds a hub with an empty registry. The heartbeat monitor is not
    /// running until [`Hub::start`] is called.
    #[must_use]
    pub fn new(config: HubConfig) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let router = MessageRouter::new(Arc::clone(&registry));
        Arc::new(Self {
            config,
            registry,
            router,
            sequence: AtomicU64::new(0),
            published: AtomicU64::new(0),
            tasks: TaskTracker::new(),
            monitor_started: AtomicBool::new(false),
            monitor_stop: CancellationToken::new(),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Starts the heartbeat monitor. Idempotent.
    pub fn start(&self) {
        if self.monitor_started.swap(true, Ordering::AcqRel) {
            return;
        }
        let monitor = HeartbeatMonitor::new(
            Arc::clone(&self.registry),
            self.config.heartbeat_interval,
            self.config.heartbeat_timeout,
        );
        tracing::info!(
            max_missed_probes = self.config.max_missed_probes(),
            queue_capacity = self.config.outbound_queue_capacity,
            "starting heartbeat monitor"
        );
        self.tasks.spawn(monitor.run(self.monitor_stop.clone()));
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Returns the connection registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Returns the tracker that owns connection and monitor tasks.
    #[must_use]
    pub const fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Returns `true` once [`Hub::shutdown`] has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Validates an upgrade request for `user_id` and, on success, hands the
    /// socket to a new connection.
    ///
    /// Failures are rendered as error responses: 400 for a missing or
    /// malformed user id, 426 without upgrade headers, 500 when negotiation
    /// fails, 503 during shutdown.
    pub fn handle_upgrade(
        self: &Arc<Self>,
        upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
        user_id: Option<&str>,
    ) -> Response {
        crate::ws::handler::handle_upgrade(self, upgrade, user_id)
    }

    /// Publishes an event to every live connection of its target users.
    ///
    /// Never blocks and never fails: targets without live connections are
    /// skipped and full queues drop the event for that connection only.
    pub fn publish(&self, request: PublishRequest) -> PublishReceipt {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let event = Arc::new(NotificationEvent::new(sequence, request));
        let route = self.router.route(&event);
        self.published.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            sequence,
            targets = event.target_user_ids().len(),
            delivered = route.delivered,
            dropped = route.dropped,
            "notification published"
        );

        PublishReceipt {
            sequence,
            targets: event.target_user_ids().len(),
            published_at: event.published_at(),
            route,
        }
    }

    /// Creates and registers a connection for `user_id`.
    ///
    /// Returns the connection and the receiving half of its outbound queue.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::ShuttingDown`] once shutdown has begun.
    pub fn open_connection(
        &self,
        user_id: UserId,
    ) -> Result<(Arc<Connection>, mpsc::Receiver<Outbound>), HubError> {
        if self.is_shutting_down() {
            return Err(HubError::ShuttingDown);
        }

        let (conn, rx) = Connection::new(user_id, self.config.outbound_queue_capacity);
        let conn = Arc::new(conn);
        let id = self.registry.register(Arc::clone(&conn));

        // Shutdown may have swept the registry between the check and the
        // insert; make sure this connection drains with the rest.
        if self.is_shutting_down() {
            conn.begin_draining();
        }

        tracing::info!(
            conn_id = %id,
            user_id = %conn.user_id(),
            user_connections = self.registry.connections_for(conn.user_id()).len(),
            "connection registered"
        );
        Ok((conn, rx))
    }

    /// Moves a connection to `closed` and removes it from the registry.
    ///
    /// Safe to call any number of times; only the first call has effect.
    pub fn close_connection(&self, conn: &Connection) {
        if !conn.mark_closed() {
            return;
        }
        self.registry.unregister(conn.id());
        tracing::info!(
            conn_id = %conn.id(),
            user_id = %conn.user_id(),
            dropped = conn.dropped_count(),
            queued = conn.queued_count(),
            "connection closed"
        );
    }

    /// Returns aggregate counters.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            connections: self.registry.connection_count(),
            users: self.registry.user_count(),
            published: self.published.load(Ordering::Relaxed),
            delivered: self.router.delivered_total(),
            dropped: self.router.dropped_total(),
            shutting_down: self.is_shutting_down(),
        }
    }

    /// Drains every connection and stops background work.
    ///
    /// New upgrades are refused from the moment this is called. Open
    /// connections move to `draining` and get up to
    /// [`HubConfig::shutdown_grace`] to flush; whatever is left after that
    /// is closed forcibly. Calling this more than once is harmless.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let connections = self.registry.all_connections();
        tracing::info!(connections = connections.len(), "hub shutting down");

        self.monitor_stop.cancel();
        for conn in &connections {
            conn.begin_draining();
        }

        self.tasks.close();
        if tokio::time::timeout(self.config.shutdown_grace, self.tasks.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tasks.len(),
                "shutdown grace elapsed, forcing close"
            );
        }

        for conn in self.registry.clear() {
            conn.mark_closed();
        }
        tracing::info!("hub shutdown complete");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::ConnectionState;

    fn user(raw: &str) -> UserId {
        let Ok(id) = UserId::parse(raw) else {
            panic!("valid user id");
        };
        id
    }

    fn payloads(rx: &mut mpsc::Receiver<Outbound>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(item) = rx.try_recv() {
            if let Outbound::Event(e) = item {
                out.push(String::from_utf8_lossy(e.payload()).into_owned());
            }
        }
        out
    }

    #[tokio::test]
    async fn publish_assigns_increasing_sequence() {
        let hub = Hub::new(HubConfig::default());
        let a = hub.publish(PublishRequest::to_user(user("u1"), "x"));
        let b = hub.publish(PublishRequest::to_user(user("u1"), "y"));
        assert!(b.sequence > a.sequence);
        assert_eq!(hub.stats().published, 2);
    }

    #[tokio::test]
    async fn publish_to_offline_user_returns_immediately() {
        let hub = Hub::new(HubConfig::default());
        let receipt = hub.publish(PublishRequest::to_user(user("ghost"), "x"));
        assert_eq!(receipt.route, RouteReport::default());
        assert_eq!(receipt.targets, 1);
    }

    #[tokio::test]
    async fn two_devices_then_one() {
        let hub = Hub::new(HubConfig::default());
        let Ok((a, mut rx_a)) = hub.open_connection(user("u1")) else {
            panic!("open a");
        };
        let Ok((_b, mut rx_b)) = hub.open_connection(user("u1")) else {
            panic!("open b");
        };

        hub.publish(PublishRequest::to_user(user("u1"), "P1"));
        hub.close_connection(&a);
        hub.publish(PublishRequest::to_user(user("u1"), "P2"));

        assert_eq!(payloads(&mut rx_a), vec!["P1"]);
        assert_eq!(payloads(&mut rx_b), vec!["P1", "P2"]);
        assert_eq!(hub.stats().connections, 1);
    }

    #[tokio::test]
    async fn close_connection_is_idempotent() {
        let hub = Hub::new(HubConfig::default());
        let Ok((conn, _rx)) = hub.open_connection(user("u1")) else {
            panic!("open");
        };
        assert_eq!(hub.registry().connection_count(), 1);
        hub.close_connection(&conn);
        hub.close_connection(&conn);
        assert_eq!(hub.registry().connection_count(), 0);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn shutdown_drains_and_refuses_new_connections() {
        let config = HubConfig {
            shutdown_grace: Duration::from_millis(50),
            ..HubConfig::default()
        };
        let hub = Hub::new(config);
        hub.start();
        let Ok((conn, _rx)) = hub.open_connection(user("u1")) else {
            panic!("open");
        };

        hub.shutdown().await;

        assert!(conn.is_draining());
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(hub.registry().is_empty());
        assert!(hub.stats().shutting_down);
        assert!(matches!(
            hub.open_connection(user("u2")),
            Err(HubError::ShuttingDown)
        ));
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let hub = Hub::new(HubConfig::default());
        hub.start();
        hub.start();
        assert_eq!(hub.tasks().len(), 1);
        hub.shutdown().await;
    }

    #[tokio::test]
    async fn global_instance_is_shared() {
        let first = init(HubConfig::default());
        let second = init(HubConfig::default());
        assert!(Arc::ptr_eq(&first, &second));
        let Some(third) = global() else {
            panic!("global hub expected");
        };
        assert!(Arc::ptr_eq(&first, &third));
    }
}
