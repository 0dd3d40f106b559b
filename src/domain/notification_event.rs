//! Notification events handed to the hub by external publishers.
//!
//! A [`NotificationEvent`] is created by [`crate::service::Hub::publish`],
//! fanned out by the [`crate::service::MessageRouter`] and discarded once
//! every delivery attempt has been made. The hub never persists it.

use std::collections::BTreeSet;

use axum::body::Bytes;
use chrono::{DateTime, Utc};

use super::UserId;

/// Publisher-side request: who should receive what.
///
/// The payload is opaque to the hub; it is written to each socket verbatim.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Identities whose live connections should receive the payload.
    pub target_user_ids: BTreeSet<UserId>,
    /// Already-materialized notification body.
    pub payload: Bytes,
}

impl PublishRequest {
    /// Builds a request addressed to the given users.
    #[must_use]
    pub fn new(target_user_ids: impl IntoIterator<Item = UserId>, payload: impl Into<Bytes>) -> Self {
        Self {
            target_user_ids: target_user_ids.into_iter().collect(),
            payload: payload.into(),
        }
    }

    /// Convenience constructor for a single recipient.
    #[must_use]
    pub fn to_user(user_id: UserId, payload: impl Into<Bytes>) -> Self {
        Self::new([user_id], payload)
    }
}

/// Immutable, sequenced event ready for fan-out.
///
/// The sequence number is assigned at publish time from a hub-wide
/// monotonically increasing counter. It exists for ordering diagnostics only;
/// nothing replays events by sequence.
#[derive(Debug)]
pub struct NotificationEvent {
    sequence: u64,
    target_user_ids: BTreeSet<UserId>,
    payload: Bytes,
    published_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Seals a publish request with its sequence number.
    #[must_use]
    pub fn new(sequence: u64, request: PublishRequest) -> Self {
        Self {
            sequence,
            target_user_ids: request.target_user_ids,
            payload: request.payload,
            published_at: Utc::now(),
        }
    }

    /// Returns the publish-time sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the set of addressed identities.
    #[must_use]
    pub const fn target_user_ids(&self) -> &BTreeSet<UserId> {
        &self.target_user_ids
    }

    /// Returns the opaque payload.
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the wall-clock time the event was sealed.
    #[must_use]
    pub const fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn user(raw: &str) -> UserId {
        let Ok(id) = UserId::parse(raw) else {
            panic!("valid user id");
        };
        id
    }

    #[test]
    fn duplicate_targets_collapse() {
        let request = PublishRequest::new([user("u1"), user("u1"), user("u2")], "hello");
        assert_eq!(request.target_user_ids.len(), 2);
    }

    #[test]
    fn event_keeps_sequence_and_payload() {
        let event = NotificationEvent::new(7, PublishRequest::to_user(user("u1"), "P1"));
        assert_eq!(event.sequence(), 7);
        assert_eq!(event.payload().as_ref(), b"P1");
        assert!(event.target_user_ids().contains(&user("u1")));
    }
}
