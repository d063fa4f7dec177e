//! Codec for encoding and decoding room payloads.
//!
//! Payloads are JSON objects. Decoding is strict about shape: anything that
//! is not an object carrying `user` and `message` is rejected.

use bytes::Bytes;
use thiserror::Error;

use crate::wire::WirePayload;

/// Maximum encoded payload size (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload exceeds maximum size.
    #[error("Payload size {0} exceeds maximum {MAX_PAYLOAD_SIZE}")]
    PayloadTooLarge(usize),

    /// Payload is not a well-formed wire object.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// JSON encoding error.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Encode a message into its wire representation.
///
/// # Errors
///
/// Returns an error if the payload is too large or encoding fails.
pub fn encode(sender: &str, body: &str, is_system: bool) -> Result<Bytes, ProtocolError> {
    let payload = WirePayload {
        user: sender.to_string(),
        message: body.to_string(),
        system: is_system,
    };
    encode_payload(&payload)
}

/// Encode an already-built payload.
///
/// # Errors
///
/// Returns an error if the payload is too large or encoding fails.
pub fn encode_payload(payload: &WirePayload) -> Result<Bytes, ProtocolError> {
    let data = serde_json::to_vec(payload)?;

    if data.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }

    Ok(Bytes::from(data))
}

/// Decode a wire payload.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedPayload`] if the data is empty, not JSON,
/// not a JSON object, or lacks `user`/`message`.
pub fn decode(data: &[u8]) -> Result<WirePayload, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::MalformedPayload("empty payload".into()));
    }

    if data.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }

    let value: serde_json::Value = serde_json::from_slice(data)
        .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;

    // Derived struct deserialization also accepts sequences, so check the
    // shape before handing the value to serde.
    if !value.is_object() {
        return Err(ProtocolError::MalformedPayload(
            "expected a JSON object".into(),
        ));
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::MalformedPayload(e.to_string()))
}
