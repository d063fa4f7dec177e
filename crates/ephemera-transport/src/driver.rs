//! Session driver.
//!
//! [`drive`] runs one session over one [`Connection`]: it opens the session,
//! relays client text into it, writes the session's outbound queue to the
//! client, and runs the close transition on every exit path.

use bytes::Bytes;
use ephemera_core::{CloseReason, Outbound, Session};
use ephemera_protocol::{codec, render};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::traits::Connection;

/// How queued payloads are written to the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundFormat {
    /// The JSON wire object, unchanged.
    #[default]
    Json,
    /// A turbo-stream fragment rendered at receipt time.
    Html,
}

/// Driver configuration.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Outbound format.
    pub format: OutboundFormat,
    /// DOM id that turbo-stream fragments append to.
    pub stream_target: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            format: OutboundFormat::Json,
            stream_target: render::DEFAULT_STREAM_TARGET.to_string(),
        }
    }
}

/// Why the driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCause {
    /// The client closed or hung up.
    ClientClosed,
    /// Reading from or writing to the client failed.
    Transport,
    /// The session was told to close.
    Signalled(CloseReason),
}

impl fmt::Display for CloseCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseCause::ClientClosed => f.write_str("client closed"),
            CloseCause::Transport => f.write_str("transport error"),
            CloseCause::Signalled(reason) => write!(f, "{reason}"),
        }
    }
}

/// Counters collected while driving a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Messages received from the client.
    pub inbound_messages: u64,
    /// Bytes received from the client.
    pub inbound_bytes: u64,
    /// Messages written to the client.
    pub outbound_messages: u64,
    /// Bytes written to the client.
    pub outbound_bytes: u64,
    /// Queued payloads dropped because they failed to decode.
    pub malformed: u64,
    /// Other subscribers dropped while publishing this client's messages.
    pub dropped_deliveries: u64,
    /// Why the session ended.
    pub cause: CloseCause,
}

/// Drive `session` over `conn` until either side closes.
pub async fn drive<C: Connection>(
    mut conn: C,
    session: Session,
    outbound: Outbound,
    config: &DriverConfig,
) -> SessionSummary {
    let (mut queue, close) = outbound.into_parts();
    let mut summary = SessionSummary {
        inbound_messages: 0,
        inbound_bytes: 0,
        outbound_messages: 0,
        outbound_bytes: 0,
        malformed: 0,
        dropped_deliveries: 0,
        cause: CloseCause::ClientClosed,
    };

    session.on_open();
    debug!(
        connection = %session.id(),
        remote = conn.remote_addr().as_deref().unwrap_or("unknown"),
        "Driving session"
    );

    summary.cause = loop {
        tokio::select! {
            biased;

            reason = close.triggered() => break CloseCause::Signalled(reason),

            Some(payload) = queue.recv() => {
                let Some(text) = format_outbound(&payload, config) else {
                    summary.malformed += 1;
                    continue;
                };
                let len = text.len() as u64;

                // A stalled peer must not hold up the close sequence.
                tokio::select! {
                    biased;
                    reason = close.triggered() => break CloseCause::Signalled(reason),
                    result = conn.send(text) => {
                        if let Err(e) = result {
                            debug!(connection = %session.id(), error = %e, "Send failed");
                            break CloseCause::Transport;
                        }
                    }
                }

                summary.outbound_messages += 1;
                summary.outbound_bytes += len;
            }

            inbound = conn.recv() => {
                match inbound {
                    Ok(Some(text)) => {
                        summary.inbound_messages += 1;
                        summary.inbound_bytes += text.len() as u64;
                        let report = session.on_message(&text);
                        summary.dropped_deliveries += report.dropped as u64;
                    }
                    Ok(None) => break CloseCause::ClientClosed,
                    Err(e) => {
                        warn!(connection = %session.id(), error = %e, "Receive failed");
                        break CloseCause::Transport;
                    }
                }
            }
        }
    };

    session.on_close();
    if let Err(e) = conn.close().await {
        debug!(connection = %session.id(), error = %e, "Close failed");
    }

    info!(
        connection = %session.id(),
        room = %session.room(),
        cause = %summary.cause,
        inbound = summary.inbound_messages,
        outbound = summary.outbound_messages,
        "Connection finished"
    );
    summary
}

/// Turn a queued payload into the text sent to the client.
///
/// Payloads that do not decode are dropped.
pub fn format_outbound(payload: &Bytes, config: &DriverConfig) -> Option<String> {
    let decoded = match codec::decode(payload) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "Dropping malformed payload");
            return None;
        }
    };

    match config.format {
        OutboundFormat::Json => String::from_utf8(payload.to_vec()).ok(),
        OutboundFormat::Html => Some(
            render::render_payload(&decoded).into_turbo_stream(&config.stream_target),
        ),
    }
}
