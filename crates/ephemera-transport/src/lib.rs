//! # ephemera-transport
//!
//! Transport layer for the Ephemera chat relay.
//!
//! - **Connection** - the text-message link to one client
//! - **WebSocket** - axum's upgraded socket behind [`Connection`]
//! - **Memory** - an in-process pair for tests and benchmarks
//! - **Driver** - runs a [`Session`](ephemera_core::Session) over a connection
//!
//! ```rust,ignore
//! use ephemera_transport::{drive, DriverConfig, WebSocketConnection};
//!
//! let (session, outbound) = relay.connect(params);
//! let conn = WebSocketConnection::new(socket, max_message_size);
//! let summary = drive(conn, session, outbound, &DriverConfig::default()).await;
//! ```

pub mod driver;
pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use driver::{drive, CloseCause, DriverConfig, OutboundFormat, SessionSummary};
pub use memory::{pair, MemoryClient, MemoryConnection};
pub use traits::{Connection, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, DEFAULT_MAX_MESSAGE_SIZE};
