//! In-process connection pair.
//!
//! [`pair`] returns the server side ([`MemoryConnection`]) and a client
//! handle ([`MemoryClient`]) joined by bounded queues. Used by tests and
//! benchmarks to drive sessions without a socket.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::traits::{Connection, TransportError};

/// Server side of an in-memory link.
#[derive(Debug)]
pub struct MemoryConnection {
    inbound: mpsc::Receiver<String>,
    outbound: mpsc::Sender<String>,
    is_open: bool,
}

/// Client side of an in-memory link.
#[derive(Debug)]
pub struct MemoryClient {
    outbound: Option<mpsc::Sender<String>>,
    inbound: mpsc::Receiver<String>,
}

/// Create a connected pair. `capacity` bounds each direction.
#[must_use]
pub fn pair(capacity: usize) -> (MemoryConnection, MemoryClient) {
    let (client_tx, server_rx) = mpsc::channel(capacity.max(1));
    let (server_tx, client_rx) = mpsc::channel(capacity.max(1));

    (
        MemoryConnection {
            inbound: server_rx,
            outbound: server_tx,
            is_open: true,
        },
        MemoryClient {
            outbound: Some(client_tx),
            inbound: client_rx,
        },
    )
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        if !self.is_open {
            return Ok(None);
        }
        Ok(self.inbound.recv().await)
    }

    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if !self.is_open {
            return Err(TransportError::ConnectionClosed);
        }
        self.outbound
            .send(text)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.is_open = false;
        self.inbound.close();
        Ok(())
    }

    fn remote_addr(&self) -> Option<String> {
        Some("memory".to_string())
    }
}

impl MemoryClient {
    /// Send text to the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the client disconnected or the server closed.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), TransportError> {
        let Some(tx) = &self.outbound else {
            return Err(TransportError::ConnectionClosed);
        };
        tx.send(text.into())
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Receive the next message from the server.
    ///
    /// Returns `None` once the server side is dropped.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    /// Take a message without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.inbound.try_recv().ok()
    }

    /// Hang up. The server's next `recv` returns `None`.
    pub fn disconnect(&mut self) {
        self.outbound = None;
    }
}
