//! # ephemera-protocol
//!
//! Wire payload definitions and presentation rendering for Ephemera rooms.
//!
//! Every message broadcast to a room travels as a small JSON object:
//!
//! ```json
//! {"user": "alice", "message": "hello"}
//! {"user": "", "message": "alice has joined", "system": true}
//! ```
//!
//! The `system` field is only present on server-authored notices. Clients
//! never send this object; they send raw text and the server wraps it.
//!
//! Rendering turns a payload into the HTML fragment shown to humans. The
//! timestamp is taken at render time, so every subscriber shows its own
//! receipt time.
//!
//! ## Example
//!
//! ```rust
//! use ephemera_protocol::{codec, render};
//!
//! let encoded = codec::encode("alice", "<b>hi</b>", false).unwrap();
//! let payload = codec::decode(&encoded).unwrap();
//! assert_eq!(payload.message, "<b>hi</b>");
//!
//! let fragment = render::render_payload(&payload);
//! assert!(fragment.as_str().contains("&lt;b&gt;hi&lt;/b&gt;"));
//! ```

pub mod codec;
pub mod render;
pub mod wire;

pub use codec::{decode, encode, ProtocolError};
pub use render::{render, render_at, Fragment};
pub use wire::WirePayload;
