//! Concurrent connection storage sharded by user.
//!
//! [`ConnectionRegistry`] maps each user to the set of that user's live
//! connections (multi-device) and keeps a reverse index from connection id
//! to owner so removal needs only the id. Both maps are [`DashMap`]s, so
//! every operation locks a single shard: registrations for unrelated users
//! proceed in parallel while operations on the same user are serialized.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{Connection, ConnectionId, UserId};

/// Registry of every open connection, keyed by user.
///
/// # Invariants
///
/// - A user present in the registry always maps to a non-empty set; the
///   operation that empties a set removes the user in the same critical
///   section.
/// - A connection id appears at most once.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    by_user: DashMap<UserId, HashMap<ConnectionId, Arc<Connection>>>,
    owners: DashMap<ConnectionId, UserId>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a connection under its owner's set and moves it to `open`.
    ///
    /// Registering the same connection twice is a no-op that returns the
    /// existing id.
    pub fn register(&self, connection: Arc<Connection>) -> ConnectionId {
        let id = connection.id();
        let user_id = connection.user_id().clone();

        match self.owners.entry(id) {
            Entry::Occupied(_) => {
                tracing::warn!(conn_id = %id, "connection already registered");
                return id;
            }
            Entry::Vacant(slot) => {
                slot.insert(user_id.clone());
            }
        }

        // Open under the user's shard lock so snapshots never observe a
        // registered connection that is still `connecting`.
        let mut set = self.by_user.entry(user_id).or_default();
        set.insert(id, Arc::clone(&connection));
        if !connection.mark_open() {
            tracing::debug!(conn_id = %id, state = %connection.state(), "registered non-connecting connection");
        }
        drop(set);

        id
    }

    /// Removes a connection. Unknown or already-removed ids are ignored.
    ///
    /// Returns the removed connection, if this call removed it.
    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let (_, user_id) = self.owners.remove(&id)?;

        let mut removed = None;
        if let Entry::Occupied(mut entry) = self.by_user.entry(user_id) {
            removed = entry.get_mut().remove(&id);
            if entry.get().is_empty() {
                entry.remove();
            }
        }
        removed
    }

    /// Returns a point-in-time copy of the user's live connections.
    ///
    /// The snapshot is detached: connections in it may close at any moment.
    #[must_use]
    pub fn connections_for(&self, user_id: &UserId) -> Vec<Arc<Connection>> {
        self.by_user
            .get(user_id)
            .map(|set| set.values().map(Arc::clone).collect())
            .unwrap_or_default()
    }

    /// Looks up a single connection by id.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        let user_id = self.owners.get(&id).map(|owner| owner.value().clone())?;
        self.by_user
            .get(&user_id)
            .and_then(|set| set.get(&id).map(Arc::clone))
    }

    /// Returns `true` if the id is currently registered.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Returns a snapshot of every registered connection id.
    #[must_use]
    pub fn all_connection_ids(&self) -> Vec<ConnectionId> {
        self.owners.iter().map(|entry| *entry.key()).collect()
    }

    /// Returns a snapshot of every registered connection.
    #[must_use]
    pub fn all_connections(&self) -> Vec<Arc<Connection>> {
        self.by_user
            .iter()
            .flat_map(|entry| entry.value().values().map(Arc::clone).collect::<Vec<_>>())
            .collect()
    }

    /// Removes every connection, returning what was removed.
    pub fn clear(&self) -> Vec<Arc<Connection>> {
        self.all_connection_ids()
            .into_iter()
            .filter_map(|id| self.unregister(id))
            .collect()
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.owners.len()
    }

    /// Returns the number of users with at least one connection.
    #[must_use]
    pub fn user_count(&self) -> usize {
        self.by_user.len()
    }

    /// Returns `true` if no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::ConnectionState;

    fn user(raw: &str) -> UserId {
        let Ok(id) = UserId::parse(raw) else {
            panic!("valid user id");
        };
        id
    }

    fn connection(raw: &str) -> Arc<Connection> {
        let (conn, _rx) = Connection::new(user(raw), 8);
        Arc::new(conn)
    }

    #[test]
    fn register_opens_and_indexes() {
        let registry = ConnectionRegistry::new();
        let conn = connection("u1");
        let id = registry.register(Arc::clone(&conn));

        assert_eq!(id, conn.id());
        assert_eq!(conn.state(), ConnectionState::Open);
        assert!(registry.contains(id));
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.user_count(), 1);
        assert!(registry.get(id).is_some());
    }

    #[test]
    fn duplicate_register_is_noop() {
        let registry = ConnectionRegistry::new();
        let conn = connection("u1");
        registry.register(Arc::clone(&conn));
        registry.register(Arc::clone(&conn));
        assert_eq!(registry.connection_count(), 1);
        assert_eq!(registry.connections_for(&user("u1")).len(), 1);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let id = registry.register(connection("u1"));

        assert!(registry.unregister(id).is_some());
        assert!(registry.unregister(id).is_none());
        assert!(registry.unregister(ConnectionId::new()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn emptied_user_is_removed() {
        let registry = ConnectionRegistry::new();
        let id = registry.register(connection("u1"));
        registry.unregister(id);
        assert_eq!(registry.user_count(), 0);
        assert!(registry.connections_for(&user("u1")).is_empty());
    }

    #[test]
    fn closing_one_of_many_keeps_the_rest() {
        let registry = ConnectionRegistry::new();
        let ids: Vec<_> = (0..5).map(|_| registry.register(connection("u1"))).collect();
        let Some((first, rest)) = ids.split_first() else {
            panic!("expected ids");
        };

        registry.unregister(*first);

        let remaining = registry.connections_for(&user("u1"));
        assert_eq!(remaining.len(), 4);
        for id in rest {
            assert!(remaining.iter().any(|c| c.id() == *id));
        }
        assert_eq!(registry.user_count(), 1);
    }

    #[test]
    fn snapshot_is_detached() {
        let registry = ConnectionRegistry::new();
        let id = registry.register(connection("u1"));
        let snapshot = registry.connections_for(&user("u1"));
        registry.unregister(id);
        assert_eq!(snapshot.len(), 1);
        assert!(registry.connections_for(&user("u1")).is_empty());
    }

    #[test]
    fn all_ids_spans_users() {
        let registry = ConnectionRegistry::new();
        let a = registry.register(connection("u1"));
        let b = registry.register(connection("u2"));
        let ids = registry.all_connection_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a));
        assert!(ids.contains(&b));
        assert_eq!(registry.all_connections().len(), 2);
    }

    #[test]
    fn clear_removes_everything() {
        let registry = ConnectionRegistry::new();
        registry.register(connection("u1"));
        registry.register(connection("u2"));
        assert_eq!(registry.clear().len(), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.user_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registration_and_removal() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut handles = Vec::new();
        for i in 0..64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let name = format!("u{}", i % 4);
                let id = registry.register(connection(&name));
                if i % 2 == 0 {
                    registry.unregister(id);
                }
            }));
        }
        for handle in handles {
            assert!(handle.await.is_ok());
        }

        assert_eq!(registry.connection_count(), 32);
        let per_user: usize = (0..4)
            .map(|i| registry.connections_for(&user(&format!("u{i}"))).len())
            .sum();
        assert_eq!(per_user, 32);
    }
}
