//! Shared fixtures for the Ephemera benchmarks.

use bytes::Bytes;
use ephemera_core::subscriber::{self, ConnectionId};
use ephemera_core::RoomRegistry;
use ephemera_protocol::codec;
use tokio::sync::mpsc;

/// A registry with one populated room and the subscribers' queues.
pub struct Fanout {
    /// The registry holding the room.
    pub registry: RoomRegistry,
    /// Outbound queue of every subscriber, in join order.
    pub receivers: Vec<mpsc::Receiver<Bytes>>,
}

impl Fanout {
    /// Subscribe `size` connections to `room`, each with a queue of `capacity`.
    #[must_use]
    pub fn new(room: &str, size: usize, capacity: usize) -> Self {
        let registry = RoomRegistry::new();
        let receivers = (0..size)
            .map(|i| {
                let (sub, rx, _close) =
                    subscriber::channel(ConnectionId::new(format!("conn-{i}")), capacity);
                registry.subscribe(room, sub);
                rx
            })
            .collect();

        Self {
            registry,
            receivers,
        }
    }

    /// Empty every queue, returning how many payloads were waiting.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        for rx in &mut self.receivers {
            while rx.try_recv().is_ok() {
                drained += 1;
            }
        }
        drained
    }
}

/// An encoded user message with a body of `len` bytes.
#[must_use]
pub fn sample_payload(len: usize) -> Bytes {
    codec::encode("bench", &"x".repeat(len), false).unwrap_or_default()
}
