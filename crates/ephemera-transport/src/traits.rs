//! Transport abstraction traits for Ephemera.
//!
//! A [`Connection`] is the text-message link to one client. The session
//! driver only talks to this trait, so WebSocket and in-memory links are
//! interchangeable.

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Inbound message exceeds the configured limit.
    #[error("Message size {size} exceeds maximum {max}")]
    MessageTooLarge {
        /// Received size in bytes.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// An active client connection.
#[async_trait]
pub trait Connection: Send {
    /// Receive the next text message from the client.
    ///
    /// Returns `None` if the connection is closed cleanly. Must be
    /// cancel-safe: the driver polls it inside `select!`.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    /// Send a text message to the client.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Get the remote address of the connection, if available.
    fn remote_addr(&self) -> Option<String> {
        None
    }
}
