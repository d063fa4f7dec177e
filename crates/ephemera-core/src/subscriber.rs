//! Subscriber registrations.
//!
//! A [`Subscriber`] is what a room holds for a connection: the sending half
//! of the connection's bounded outbound queue and a shared [`CloseSignal`].
//! It never owns the connection itself.

use bytes::Bytes;
use std::fmt;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::sync::{mpsc, Notify};

/// Unique identifier for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Create a connection ID from an existing value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random connection ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("conn_{}", uuid::Uuid::new_v4().simple()))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Why a connection was asked to close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The outbound queue was full when a broadcast arrived.
    Overflow,
    /// The outbound queue's receiver is gone.
    Disconnected,
    /// The session ran its close transition.
    SessionClosed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::Overflow => "outbound queue overflow",
            CloseReason::Disconnected => "receiver disconnected",
            CloseReason::SessionClosed => "session closed",
        };
        f.write_str(s)
    }
}

/// One-shot, multi-source close notification.
///
/// The first call to [`trigger`](Self::trigger) wins and records its reason;
/// later calls are no-ops.
#[derive(Debug, Default)]
pub struct CloseSignal {
    reason: OnceLock<CloseReason>,
    notify: Notify,
}

impl CloseSignal {
    /// Create an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger the signal.
    ///
    /// Returns `true` if this call was the one that triggered it.
    pub fn trigger(&self, reason: CloseReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        if first {
            self.notify.notify_one();
        }
        first
    }

    /// Check whether the signal has fired.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.reason.get().is_some()
    }

    /// The reason recorded by the first trigger.
    #[must_use]
    pub fn reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }

    /// Wait until the signal fires.
    pub async fn triggered(&self) -> CloseReason {
        loop {
            if let Some(reason) = self.reason() {
                return reason;
            }
            self.notify.notified().await;
        }
    }
}

/// Delivery failures for a single subscriber.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber's queue is full.
    #[error("outbound queue full")]
    Overflow,
    /// The subscriber's queue receiver was dropped.
    #[error("subscriber disconnected")]
    Disconnected,
}

impl From<DeliveryError> for CloseReason {
    fn from(e: DeliveryError) -> Self {
        match e {
            DeliveryError::Overflow => CloseReason::Overflow,
            DeliveryError::Disconnected => CloseReason::Disconnected,
        }
    }
}

/// A room's registration for one connection.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: ConnectionId,
    outbox: mpsc::Sender<Bytes>,
    close: Arc<CloseSignal>,
}

impl Subscriber {
    /// Create a subscriber registration.
    #[must_use]
    pub fn new(id: ConnectionId, outbox: mpsc::Sender<Bytes>, close: Arc<CloseSignal>) -> Self {
        Self { id, outbox, close }
    }

    /// Get the connection ID.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Queue a payload without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is full or its receiver is gone.
    pub fn deliver(&self, payload: Bytes) -> Result<(), DeliveryError> {
        if self.close.is_triggered() {
            return Err(DeliveryError::Disconnected);
        }

        self.outbox.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Overflow,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Disconnected,
        })
    }

    /// Mark the connection as failed, asking its session to close.
    pub fn fail(&self, reason: CloseReason) -> bool {
        self.close.trigger(reason)
    }

    /// Check whether the connection has been asked to close.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.close.is_triggered()
    }
}

/// Create a subscriber together with the receiving half of its queue.
#[must_use]
pub fn channel(
    id: ConnectionId,
    capacity: usize,
) -> (Subscriber, mpsc::Receiver<Bytes>, Arc<CloseSignal>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let close = Arc::new(CloseSignal::new());
    (Subscriber::new(id, tx, Arc::clone(&close)), rx, close)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_generation() {
        let id1 = ConnectionId::generate();
        let id2 = ConnectionId::generate();
        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with("conn_"));
    }

    #[test]
    fn test_close_signal_first_trigger_wins() {
        let signal = CloseSignal::new();
        assert!(!signal.is_triggered());

        assert!(signal.trigger(CloseReason::Overflow));
        assert!(!signal.trigger(CloseReason::SessionClosed));
        assert_eq!(signal.reason(), Some(CloseReason::Overflow));
    }

    #[tokio::test]
    async fn test_close_signal_wakes_waiter() {
        let signal = Arc::new(CloseSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.triggered().await })
        };

        tokio::task::yield_now().await;
        signal.trigger(CloseReason::Disconnected);

        assert_eq!(waiter.await.unwrap(), CloseReason::Disconnected);
    }

    #[test]
    fn test_deliver_overflow() {
        let (subscriber, _rx, _close) = channel("conn-1".into(), 1);

        assert!(subscriber.deliver(Bytes::from_static(b"a")).is_ok());
        assert_eq!(
            subscriber.deliver(Bytes::from_static(b"b")),
            Err(DeliveryError::Overflow)
        );
    }

    #[test]
    fn test_deliver_after_receiver_dropped() {
        let (subscriber, rx, _close) = channel("conn-1".into(), 4);
        drop(rx);

        assert_eq!(
            subscriber.deliver(Bytes::from_static(b"a")),
            Err(DeliveryError::Disconnected)
        );
    }

    #[test]
    fn test_deliver_after_close() {
        let (subscriber, mut rx, close) = channel("conn-1".into(), 4);
        close.trigger(CloseReason::SessionClosed);

        assert!(subscriber.is_closed());
        assert!(subscriber.deliver(Bytes::from_static(b"a")).is_err());
        assert!(rx.try_recv().is_err());
    }
}
