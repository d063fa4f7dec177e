//! The relay service.
//!
//! A [`Relay`] is built once at startup and shared by handle with every
//! connection handler. It is the entry point the HTTP layer uses to turn an
//! upgraded connection into a [`Session`].

use crate::broadcast::{Broadcaster, InMemoryBroadcaster};
use crate::registry::RegistryStats;
use crate::room::{resolve_room_key, PublishReport, DEFAULT_ROOM};
use crate::session::{ConnectParams, Outbound, Session};
use ephemera_protocol::codec;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default per-connection outbound queue capacity.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Room assigned when a connection names none.
    pub default_room: String,
    /// Bound on each connection's outbound queue.
    pub outbound_queue_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            default_room: DEFAULT_ROOM.to_string(),
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
        }
    }
}

/// Generate a fresh room key for a new chat landing.
#[must_use]
pub fn current_room_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Connection entry point and owner of the broadcaster.
pub struct Relay {
    broadcaster: Arc<dyn Broadcaster>,
    config: RelayConfig,
}

impl Relay {
    /// Create a relay with an in-memory broadcaster and default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// Create a relay with an in-memory broadcaster.
    #[must_use]
    pub fn with_config(config: RelayConfig) -> Self {
        Self::with_broadcaster(Arc::new(InMemoryBroadcaster::new()), config)
    }

    /// Create a relay over any broadcaster.
    #[must_use]
    pub fn with_broadcaster(broadcaster: Arc<dyn Broadcaster>, config: RelayConfig) -> Self {
        info!("Creating relay with config: {:?}", config);
        Self {
            broadcaster,
            config,
        }
    }

    /// Start a session for an upgraded connection.
    ///
    /// Missing parameters never fail: an absent room becomes the default
    /// room and an absent name becomes empty.
    #[must_use]
    pub fn connect(&self, params: ConnectParams) -> (Session, Outbound) {
        let room = resolve_room_key(params.room.as_deref(), &self.config.default_room);
        let user = params.user.unwrap_or_default();

        let (session, outbound) = Session::new(
            room,
            user,
            self.config.outbound_queue_capacity,
            Arc::clone(&self.broadcaster),
        );
        debug!(connection = %session.id(), room = %session.room(), "Session created");

        (session, outbound)
    }

    /// Publish a user message into a room without a session.
    ///
    /// Used by form posts that bypass the WebSocket.
    pub fn publish_user_message(&self, room: &str, user: &str, text: &str) -> PublishReport {
        match codec::encode(user, text, false) {
            Ok(payload) => self.broadcaster.publish(room, payload),
            Err(e) => {
                warn!(room = %room, error = %e, "Failed to encode message");
                PublishReport::default()
            }
        }
    }

    /// Get the broadcaster.
    #[must_use]
    pub fn broadcaster(&self) -> &Arc<dyn Broadcaster> {
        &self.broadcaster
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get broadcaster statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.broadcaster.stats()
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self::new()
    }
}
