//! # ephemera-core
//!
//! Room-based publish/subscribe and connection sessions for Ephemera.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Room / RoomRegistry** - which connections are subscribed to which room
//! - **Broadcaster** - fire-and-forget fan-out to a room's subscribers
//! - **Session** - per-connection `Connecting → Open → Closed` state machine
//! - **Relay** - the process-wide service that creates sessions
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Transport  │────▶│   Session   │────▶│ Broadcaster │────▶│  Registry   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                                                           │
//!        └──────────────── bounded outbound queue ◀──────────────────┘
//! ```

pub mod broadcast;
pub mod registry;
pub mod relay;
pub mod room;
pub mod session;
pub mod subscriber;

pub use broadcast::{Broadcaster, InMemoryBroadcaster};
pub use registry::{RegistryStats, RoomRegistry};
pub use relay::{current_room_key, Relay, RelayConfig};
pub use room::{resolve_room_key, PublishReport, Room, RoomKey, DEFAULT_ROOM};
pub use session::{ConnectParams, Outbound, Session, SessionState};
pub use subscriber::{CloseReason, CloseSignal, ConnectionId, DeliveryError, Subscriber};
