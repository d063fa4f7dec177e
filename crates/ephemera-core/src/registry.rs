//! Process-wide room registry.
//!
//! Maps room keys to their subscribers. Rooms are created on first subscribe
//! and pruned once their last subscriber is gone.

use crate::room::{PublishReport, Room, RoomKey};
use crate::subscriber::{ConnectionId, Subscriber};
use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, trace};

/// Registry statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of rooms with at least one subscriber.
    pub room_count: usize,
    /// Total number of subscriptions across rooms.
    pub subscriber_count: usize,
}

/// Rooms indexed by key.
///
/// Every operation on a room runs under that room's shard lock, so a
/// snapshot or broadcast never observes a half-applied subscribe.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: DashMap<RoomKey, Room>,
}

impl RoomRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `subscriber` to the room, creating the room if needed.
    ///
    /// Returns `false` if the connection was already subscribed.
    pub fn subscribe(&self, room_key: &str, subscriber: Subscriber) -> bool {
        let mut room = self.rooms.entry(room_key.to_string()).or_insert_with(|| {
            debug!(room = %room_key, "Creating room");
            Room::new(room_key)
        });

        room.subscribe(subscriber)
    }

    /// Remove a connection from the room.
    ///
    /// Returns `false` if it was not subscribed.
    pub fn unsubscribe(&self, room_key: &str, connection_id: &ConnectionId) -> bool {
        let removed = {
            let Some(mut room) = self.rooms.get_mut(room_key) else {
                trace!(room = %room_key, connection = %connection_id, "Unsubscribe from unknown room");
                return false;
            };
            room.unsubscribe(connection_id)
        };

        if removed {
            self.prune(room_key);
        }
        removed
    }

    /// Snapshot of the room's current subscribers.
    #[must_use]
    pub fn subscribers_of(&self, room_key: &str) -> Vec<Subscriber> {
        self.rooms
            .get(room_key)
            .map(|room| room.subscribers())
            .unwrap_or_default()
    }

    /// Queue `payload` for every subscriber of the room.
    ///
    /// Broadcasts to one room are serialized by the room's write lock, so all
    /// subscribers see them in the same order.
    pub fn publish(&self, room_key: &str, payload: &Bytes) -> PublishReport {
        let report = {
            let Some(mut room) = self.rooms.get_mut(room_key) else {
                trace!(room = %room_key, "Publish to empty room");
                return PublishReport::default();
            };
            room.publish(payload)
        };

        if report.dropped > 0 {
            self.prune(room_key);
        }
        report
    }

    /// Check if a room currently has an entry.
    #[must_use]
    pub fn room_exists(&self, room_key: &str) -> bool {
        self.rooms.contains_key(room_key)
    }

    /// Get the subscriber count for a room.
    #[must_use]
    pub fn subscriber_count(&self, room_key: &str) -> usize {
        self.rooms
            .get(room_key)
            .map(|room| room.subscriber_count())
            .unwrap_or(0)
    }

    /// Get all room keys.
    #[must_use]
    pub fn room_keys(&self) -> Vec<RoomKey> {
        self.rooms.iter().map(|e| e.key().clone()).collect()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            room_count: self.rooms.len(),
            subscriber_count: self.rooms.iter().map(|r| r.subscriber_count()).sum(),
        }
    }

    fn prune(&self, room_key: &str) {
        if self
            .rooms
            .remove_if(room_key, |_, room| room.is_empty())
            .is_some()
        {
            debug!(room = %room_key, "Removed empty room");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::channel;

    #[test]
    fn test_registry_subscribe_unsubscribe() {
        let registry = RoomRegistry::new();
        let (sub, _rx, _) = channel("conn-1".into(), 4);

        assert!(registry.subscribe("lobby", sub.clone()));
        assert!(!registry.subscribe("lobby", sub));
        assert_eq!(registry.subscriber_count("lobby"), 1);

        assert!(registry.unsubscribe("lobby", &"conn-1".into()));
        assert_eq!(registry.subscriber_count("lobby"), 0);
        assert!(registry.subscribers_of("lobby").is_empty());
    }

    #[test]
    fn test_registry_unsubscribe_is_noop_when_absent() {
        let registry = RoomRegistry::new();
        assert!(!registry.unsubscribe("lobby", &"ghost".into()));

        let (sub, _rx, _) = channel("conn-1".into(), 4);
        registry.subscribe("lobby", sub);
        assert!(registry.unsubscribe("lobby", &"conn-1".into()));
        assert!(!registry.unsubscribe("lobby", &"conn-1".into()));
    }

    #[test]
    fn test_registry_same_connection_in_two_rooms() {
        let registry = RoomRegistry::new();
        let (sub, _rx, _) = channel("conn-1".into(), 4);

        assert!(registry.subscribe("a", sub.clone()));
        assert!(registry.subscribe("b", sub));
        assert_eq!(registry.stats().subscriber_count, 2);
    }

    #[test]
    fn test_registry_snapshot_reflects_changes() {
        let registry = RoomRegistry::new();
        let (sub1, _rx1, _) = channel("conn-1".into(), 4);
        let (sub2, _rx2, _) = channel("conn-2".into(), 4);

        registry.subscribe("lobby", sub1);
        registry.subscribe("lobby", sub2);
        let mut ids: Vec<_> = registry
            .subscribers_of("lobby")
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["conn-1", "conn-2"]);

        registry.unsubscribe("lobby", &"conn-1".into());
        let snapshot = registry.subscribers_of("lobby");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id().as_str(), "conn-2");
    }

    #[test]
    fn test_registry_publish_isolated_per_room() {
        let registry = RoomRegistry::new();
        let (a, mut rx_a, _) = channel("conn-a".into(), 4);
        let (b, mut rx_b, _) = channel("conn-b".into(), 4);
        registry.subscribe("room-a", a);
        registry.subscribe("room-b", b);

        let report = registry.publish("room-a", &Bytes::from_static(b"hi"));
        assert_eq!(report.delivered, 1);
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_registry_publish_to_unknown_room() {
        let registry = RoomRegistry::new();
        let report = registry.publish("nowhere", &Bytes::from_static(b"hi"));
        assert_eq!(report, PublishReport::default());
    }

    #[test]
    fn test_registry_publish_removes_dead_subscriber() {
        let registry = RoomRegistry::new();
        let (gone, rx_gone, close) = channel("gone".into(), 4);
        let (alive, mut rx_alive, _) = channel("alive".into(), 4);
        registry.subscribe("lobby", gone);
        registry.subscribe("lobby", alive);
        drop(rx_gone);

        let report = registry.publish("lobby", &Bytes::from_static(b"hi"));
        assert_eq!(report, PublishReport { delivered: 1, dropped: 1 });
        assert!(close.is_triggered());
        assert_eq!(registry.subscriber_count("lobby"), 1);
        assert!(rx_alive.try_recv().is_ok());
    }

    #[test]
    fn test_registry_stats() {
        let registry = RoomRegistry::new();
        let (s1, _r1, _) = channel("conn-1".into(), 4);
        let (s2, _r2, _) = channel("conn-2".into(), 4);
        let (s3, _r3, _) = channel("conn-3".into(), 4);

        registry.subscribe("room-1", s1);
        registry.subscribe("room-1", s2);
        registry.subscribe("room-2", s3);

        let stats = registry.stats();
        assert_eq!(stats.room_count, 2);
        assert_eq!(stats.subscriber_count, 3);

        let mut keys = registry.room_keys();
        keys.sort();
        assert_eq!(keys, vec!["room-1".to_string(), "room-2".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_registry_concurrent_publishers_share_order() {
        use std::sync::Arc;

        let registry = Arc::new(RoomRegistry::new());
        let (s1, mut r1, _) = channel("conn-1".into(), 1024);
        let (s2, mut r2, _) = channel("conn-2".into(), 1024);
        registry.subscribe("lobby", s1);
        registry.subscribe("lobby", s2);

        let mut tasks = Vec::new();
        for publisher in 0..4 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                for i in 0..100 {
                    let payload = Bytes::from(format!("{publisher}:{i}"));
                    registry.publish("lobby", &payload);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut seen1 = Vec::new();
        while let Ok(msg) = r1.try_recv() {
            seen1.push(msg);
        }
        let mut seen2 = Vec::new();
        while let Ok(msg) = r2.try_recv() {
            seen2.push(msg);
        }

        assert_eq!(seen1.len(), 400);
        assert_eq!(seen1, seen2);
    }
}
