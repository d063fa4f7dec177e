//! Connection session state machine.
//!
//! A [`Session`] is created per client connection and moves through
//! `Connecting → Open → Closed`. The transport calls [`Session::on_open`],
//! [`Session::on_message`] and [`Session::on_close`]; the session owns the
//! side effects of each transition.
//!
//! ```text
//!  Connecting ──on_open──▶ Open ──on_close──▶ Closed
//!      │                   │  ▲                  ▲
//!      │                   └──┘ on_message       │
//!      └─────────────────on_close────────────────┘
//! ```

use crate::broadcast::Broadcaster;
use crate::room::{PublishReport, RoomKey};
use crate::subscriber::{CloseReason, CloseSignal, ConnectionId, Subscriber};
use bytes::Bytes;
use ephemera_protocol::{codec, WirePayload};
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Handshake parameters supplied by the HTTP layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConnectParams {
    /// Room to join.
    pub room: Option<String>,
    /// Display name.
    pub user: Option<String>,
}

impl ConnectParams {
    /// Parameters naming both a room and a user.
    #[must_use]
    pub fn new(room: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            room: Some(room.into()),
            user: Some(user.into()),
        }
    }
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Created, upgrade not yet complete.
    Connecting = 0,
    /// Subscribed and relaying.
    Open = 1,
    /// Terminal.
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Connecting,
            1 => SessionState::Open,
            _ => SessionState::Closed,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Receiving side of a session's outbound queue.
///
/// Owned by the transport task that writes to the client.
#[derive(Debug)]
pub struct Outbound {
    receiver: mpsc::Receiver<Bytes>,
    close: Arc<CloseSignal>,
}

impl Outbound {
    /// Receive the next queued payload.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    /// Take a queued payload without waiting.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.receiver.try_recv().ok()
    }

    /// The session's close signal.
    #[must_use]
    pub fn close_signal(&self) -> &Arc<CloseSignal> {
        &self.close
    }

    /// Split into the queue receiver and the close signal.
    #[must_use]
    pub fn into_parts(self) -> (mpsc::Receiver<Bytes>, Arc<CloseSignal>) {
        (self.receiver, self.close)
    }
}

/// One client connection's session.
///
/// Dropping an open session runs the close transition, so the leave notice
/// and unsubscribe happen on every exit path.
pub struct Session {
    id: ConnectionId,
    room: RoomKey,
    user: String,
    state: AtomicU8,
    subscriber: Subscriber,
    close: Arc<CloseSignal>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl Session {
    /// Create a session in the `Connecting` state.
    ///
    /// `room` must already be resolved; `capacity` bounds the outbound queue.
    #[must_use]
    pub fn new(
        room: RoomKey,
        user: String,
        capacity: usize,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> (Self, Outbound) {
        let id = ConnectionId::generate();
        let (subscriber, receiver, close) = crate::subscriber::channel(id.clone(), capacity);

        let session = Self {
            id,
            room,
            user,
            state: AtomicU8::new(SessionState::Connecting as u8),
            subscriber,
            close: Arc::clone(&close),
            broadcaster,
        };

        (session, Outbound { receiver, close })
    }

    /// Get the connection ID.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Get the room key.
    #[must_use]
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Get the display name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Get the close signal shared with the broadcaster.
    #[must_use]
    pub fn close_signal(&self) -> &Arc<CloseSignal> {
        &self.close
    }

    /// `Connecting → Open`: subscribe, then announce the join.
    ///
    /// Returns `false` if the session was not `Connecting`.
    pub fn on_open(&self) -> bool {
        if self
            .transition(SessionState::Connecting, SessionState::Open)
            .is_err()
        {
            debug!(connection = %self.id, state = %self.state(), "Open ignored");
            return false;
        }

        self.broadcaster.subscribe(&self.room, self.subscriber.clone());
        self.announce(&WirePayload::joined(&self.user));

        info!(connection = %self.id, room = %self.room, user = %self.user, "Session opened");
        true
    }

    /// `Open → Open`: relay client text as a user message.
    ///
    /// The body is forwarded as-is, including when empty. Ignored unless the
    /// session is open.
    pub fn on_message(&self, text: &str) -> PublishReport {
        if self.state() != SessionState::Open {
            trace!(connection = %self.id, state = %self.state(), "Message ignored");
            return PublishReport::default();
        }

        match codec::encode(&self.user, text, false) {
            Ok(payload) => self.broadcaster.publish(&self.room, payload),
            Err(e) => {
                warn!(connection = %self.id, error = %e, "Failed to encode message");
                PublishReport::default()
            }
        }
    }

    /// `Open → Closed`: announce the leave, then unsubscribe.
    ///
    /// Safe to call any number of times from any number of places; the
    /// transition runs exactly once. A session closed before it opened goes
    /// straight to `Closed` without announcing anything.
    ///
    /// Returns `true` if this call performed the `Open → Closed` transition.
    pub fn on_close(&self) -> bool {
        loop {
            match self.transition(SessionState::Open, SessionState::Closed) {
                Ok(()) => break,
                Err(SessionState::Connecting) => {
                    if self
                        .transition(SessionState::Connecting, SessionState::Closed)
                        .is_ok()
                    {
                        self.close.trigger(CloseReason::SessionClosed);
                        debug!(connection = %self.id, "Session closed before opening");
                        return false;
                    }
                    // Opened concurrently; retry as an open session.
                }
                Err(_) => return false,
            }
        }

        self.announce(&WirePayload::left(&self.user));
        self.broadcaster.unsubscribe(&self.room, &self.id);
        self.close.trigger(CloseReason::SessionClosed);

        info!(connection = %self.id, room = %self.room, user = %self.user, "Session closed");
        true
    }

    fn announce(&self, payload: &WirePayload) {
        match codec::encode_payload(payload) {
            Ok(data) => {
                self.broadcaster.publish(&self.room, data);
            }
            Err(e) => {
                warn!(connection = %self.id, error = %e, "Failed to encode notice");
            }
        }
    }

    fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(SessionState::from_u8)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("room", &self.room)
            .field("user", &self.user)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.on_close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::InMemoryBroadcaster;
    use crate::subscriber::channel;
    use ephemera_protocol::decode;

    fn broadcaster() -> Arc<InMemoryBroadcaster> {
        Arc::new(InMemoryBroadcaster::new())
    }

    fn open(room: &str, user: &str, broadcaster: &Arc<InMemoryBroadcaster>) -> (Session, Outbound) {
        let (session, outbound) =
            Session::new(room.to_string(), user.to_string(), 32, broadcaster.clone());
        assert!(session.on_open());
        (session, outbound)
    }

    fn next(outbound: &mut Outbound) -> WirePayload {
        let data = outbound.try_recv().expect("expected a queued payload");
        decode(&data).unwrap()
    }

    #[test]
    fn test_open_subscribes_and_announces() {
        let b = broadcaster();
        let (observer, mut observer_rx, _) = channel("observer".into(), 8);
        b.subscribe("lobby", observer);

        let (session, _outbound) = open("lobby", "alice", &b);
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(b.registry().subscriber_count("lobby"), 2);

        let data = observer_rx.try_recv().unwrap();
        assert_eq!(decode(&data).unwrap(), WirePayload::joined("alice"));
    }

    #[test]
    fn test_join_precedes_own_messages() {
        let b = broadcaster();
        let (_alice, mut alice_rx) = open("lobby", "alice", &b);

        let (bob, _bob_rx) = open("lobby", "bob", &b);
        bob.on_message("hi alice");

        assert_eq!(next(&mut alice_rx), WirePayload::joined("alice"));
        assert_eq!(next(&mut alice_rx), WirePayload::joined("bob"));
        assert_eq!(next(&mut alice_rx), WirePayload::user("bob", "hi alice"));
    }

    #[test]
    fn test_message_is_forwarded_verbatim() {
        let b = broadcaster();
        let (alice, mut alice_rx) = open("lobby", "alice", &b);
        let (_bob, mut bob_rx) = open("lobby", "bob", &b);
        alice_rx.try_recv();
        alice_rx.try_recv();
        bob_rx.try_recv();

        let report = alice.on_message("<b>hi</b>");
        assert_eq!(report.delivered, 2);

        let expected = WirePayload::user("alice", "<b>hi</b>");
        assert_eq!(next(&mut alice_rx), expected);
        assert_eq!(next(&mut bob_rx), expected);
    }

    #[test]
    fn test_empty_message_is_forwarded() {
        let b = broadcaster();
        let (alice, mut alice_rx) = open("lobby", "alice", &b);
        alice_rx.try_recv();

        alice.on_message("");
        assert_eq!(next(&mut alice_rx), WirePayload::user("alice", ""));
    }

    #[test]
    fn test_close_announces_leave_and_unsubscribes() {
        let b = broadcaster();
        let (alice, _alice_rx) = open("lobby", "alice", &b);
        let (_bob, mut bob_rx) = open("lobby", "bob", &b);
        bob_rx.try_recv();

        assert!(alice.on_close());
        assert_eq!(alice.state(), SessionState::Closed);
        assert_eq!(next(&mut bob_rx), WirePayload::left("alice"));
        assert_eq!(b.registry().subscriber_count("lobby"), 1);
        assert_eq!(
            alice.close_signal().reason(),
            Some(CloseReason::SessionClosed)
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let b = broadcaster();
        let (alice, _alice_rx) = open("lobby", "alice", &b);
        let (_bob, mut bob_rx) = open("lobby", "bob", &b);
        bob_rx.try_recv();

        assert!(alice.on_close());
        assert!(!alice.on_close());
        drop(alice);

        assert_eq!(next(&mut bob_rx), WirePayload::left("alice"));
        assert!(bob_rx.try_recv().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_close_announces_once() {
        let b = broadcaster();
        let (alice, _alice_rx) = open("lobby", "alice", &b);
        let (_bob, mut bob_rx) = open("lobby", "bob", &b);
        bob_rx.try_recv();

        let alice = Arc::new(alice);
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let alice = Arc::clone(&alice);
            tasks.push(tokio::spawn(async move { alice.on_close() }));
        }

        let mut transitions = 0;
        for task in tasks {
            if task.await.unwrap() {
                transitions += 1;
            }
        }
        assert_eq!(transitions, 1);

        assert_eq!(next(&mut bob_rx), WirePayload::left("alice"));
        assert!(bob_rx.try_recv().is_none());
    }

    #[test]
    fn test_drop_runs_close() {
        let b = broadcaster();
        let (alice, _alice_rx) = open("lobby", "alice", &b);
        let (_bob, mut bob_rx) = open("lobby", "bob", &b);
        bob_rx.try_recv();

        drop(alice);
        assert_eq!(next(&mut bob_rx), WirePayload::left("alice"));
        assert_eq!(b.registry().subscriber_count("lobby"), 1);
    }

    #[test]
    fn test_close_before_open_is_silent() {
        let b = broadcaster();
        let (_bob, mut bob_rx) = open("lobby", "bob", &b);
        bob_rx.try_recv();

        let (alice, _outbound) =
            Session::new("lobby".to_string(), "alice".to_string(), 8, b.clone());
        assert!(!alice.on_close());
        assert_eq!(alice.state(), SessionState::Closed);
        assert!(!alice.on_open());
        assert!(bob_rx.try_recv().is_none());
    }

    #[test]
    fn test_message_before_open_is_ignored() {
        let b = broadcaster();
        let (_bob, mut bob_rx) = open("lobby", "bob", &b);
        bob_rx.try_recv();

        let (alice, _outbound) =
            Session::new("lobby".to_string(), "alice".to_string(), 8, b.clone());
        assert_eq!(alice.on_message("early"), PublishReport::default());
        assert!(bob_rx.try_recv().is_none());
    }

    #[test]
    fn test_open_twice_is_noop() {
        let b = broadcaster();
        let (alice, mut alice_rx) = open("lobby", "alice", &b);
        assert!(!alice.on_open());

        assert_eq!(next(&mut alice_rx), WirePayload::joined("alice"));
        assert!(alice_rx.try_recv().is_none());
    }

    #[test]
    fn test_overflow_closes_only_slow_session() {
        let b = broadcaster();
        let (slow, _slow_rx) =
            Session::new("lobby".to_string(), "slow".to_string(), 2, b.clone());
        slow.on_open();
        let (fast, mut fast_rx) = open("lobby", "fast", &b);

        for i in 0..4 {
            fast.on_message(&format!("msg-{i}"));
        }

        assert_eq!(slow.close_signal().reason(), Some(CloseReason::Overflow));
        assert!(!fast.close_signal().is_triggered());
        assert_eq!(b.registry().subscriber_count("lobby"), 1);

        // The slow session still runs its close sequence.
        assert!(slow.on_close());
        let mut last = None;
        while let Some(data) = fast_rx.try_recv() {
            last = Some(decode(&data).unwrap());
        }
        assert_eq!(last, Some(WirePayload::left("slow")));
    }
}
