//! Room broadcast abstraction.
//!
//! Sessions only talk to a [`Broadcaster`]; the in-memory fan-out behind it
//! can be replaced without touching session logic.

use crate::registry::{RegistryStats, RoomRegistry};
use crate::room::PublishReport;
use crate::subscriber::{ConnectionId, Subscriber};
use bytes::Bytes;
use tracing::trace;

/// Publish/subscribe interface for rooms.
///
/// `publish` is fire-and-forget: it never fails, and delivery problems with
/// one subscriber never affect the others.
pub trait Broadcaster: Send + Sync {
    /// Register a subscriber in a room.
    ///
    /// Returns `false` if it was already registered there.
    fn subscribe(&self, room_key: &str, subscriber: Subscriber) -> bool;

    /// Remove a connection from a room. No-op if absent.
    fn unsubscribe(&self, room_key: &str, connection_id: &ConnectionId) -> bool;

    /// Send `payload` to every current subscriber of the room.
    fn publish(&self, room_key: &str, payload: Bytes) -> PublishReport;

    /// Snapshot of the room's current subscribers.
    fn subscribers_of(&self, room_key: &str) -> Vec<Subscriber>;

    /// Broadcaster statistics.
    fn stats(&self) -> RegistryStats;
}

/// Single-process broadcaster backed by a [`RoomRegistry`].
#[derive(Debug, Default)]
pub struct InMemoryBroadcaster {
    registry: RoomRegistry,
}

impl InMemoryBroadcaster {
    /// Create a broadcaster with an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the underlying registry.
    #[must_use]
    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }
}

impl Broadcaster for InMemoryBroadcaster {
    fn subscribe(&self, room_key: &str, subscriber: Subscriber) -> bool {
        self.registry.subscribe(room_key, subscriber)
    }

    fn unsubscribe(&self, room_key: &str, connection_id: &ConnectionId) -> bool {
        self.registry.unsubscribe(room_key, connection_id)
    }

    fn publish(&self, room_key: &str, payload: Bytes) -> PublishReport {
        let report = self.registry.publish(room_key, &payload);
        trace!(
            room = %room_key,
            bytes = payload.len(),
            recipients = report.delivered,
            "Broadcast"
        );
        report
    }

    fn subscribers_of(&self, room_key: &str) -> Vec<Subscriber> {
        self.registry.subscribers_of(room_key)
    }

    fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }
}
