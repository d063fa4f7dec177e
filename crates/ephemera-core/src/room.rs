//! Room abstraction for Ephemera.
//!
//! Rooms are named groups of connections; every broadcast to a room reaches
//! all of its current subscribers.

use crate::subscriber::{ConnectionId, Subscriber};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Room used when a connection does not name one.
pub const DEFAULT_ROOM: &str = "default";

/// A room identifier.
pub type RoomKey = String;

/// Resolve the room a connection should join.
///
/// Absent or blank keys fall back to `fallback`.
#[must_use]
pub fn resolve_room_key(room: Option<&str>, fallback: &str) -> RoomKey {
    match room.map(str::trim) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => fallback.to_string(),
    }
}

/// Outcome of a single broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the payload was queued for.
    pub delivered: usize,
    /// Subscribers that failed and were removed from the room.
    pub dropped: usize,
}

/// A room and its subscribers.
#[derive(Debug)]
pub struct Room {
    /// Room key.
    key: RoomKey,
    /// Subscribers indexed by connection ID.
    subscribers: HashMap<ConnectionId, Subscriber>,
}

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new(key: impl Into<RoomKey>) -> Self {
        Self {
            key: key.into(),
            subscribers: HashMap::new(),
        }
    }

    /// Get the room key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the number of subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Check if a connection is subscribed.
    #[must_use]
    pub fn is_subscribed(&self, connection_id: &ConnectionId) -> bool {
        self.subscribers.contains_key(connection_id)
    }

    /// Add a subscriber.
    ///
    /// Returns `false` if the connection was already subscribed.
    pub fn subscribe(&mut self, subscriber: Subscriber) -> bool {
        if self.subscribers.contains_key(subscriber.id()) {
            trace!(room = %self.key, connection = %subscriber.id(), "Duplicate subscription ignored");
            return false;
        }

        debug!(room = %self.key, connection = %subscriber.id(), "Connection subscribed");
        self.subscribers.insert(subscriber.id().clone(), subscriber);
        true
    }

    /// Remove a subscriber.
    ///
    /// Returns `true` if the connection was subscribed.
    pub fn unsubscribe(&mut self, connection_id: &ConnectionId) -> bool {
        let removed = self.subscribers.remove(connection_id).is_some();
        if removed {
            debug!(room = %self.key, connection = %connection_id, "Connection unsubscribed");
        }
        removed
    }

    /// Queue `payload` for every subscriber.
    ///
    /// A subscriber whose queue is full or closed is told to close and is
    /// removed from the room; the others are unaffected.
    pub fn publish(&mut self, payload: &Bytes) -> PublishReport {
        let mut report = PublishReport::default();
        let key = &self.key;

        self.subscribers
            .retain(|id, subscriber| match subscriber.deliver(payload.clone()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(e) => {
                    warn!(room = %key, connection = %id, error = %e, "Dropping subscriber");
                    subscriber.fail(e.into());
                    report.dropped += 1;
                    false
                }
            });

        trace!(
            room = %self.key,
            delivered = report.delivered,
            dropped = report.dropped,
            "Published message"
        );
        report
    }

    /// Get all subscribers.
    #[must_use]
    pub fn subscribers(&self) -> Vec<Subscriber> {
        self.subscribers.values().cloned().collect()
    }

    /// Check if the room is empty (no subscribers).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
