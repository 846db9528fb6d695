//! Parley wire protocol
//!
//! Typed transport events and the packet codec shared by the client and the
//! simulation server.
//!
//! # Packets
//!
//! Every event travels as a JSON array `["<event>", <payload>]`, the shape a
//! Socket.IO event channel carries. The event name is the wire contract and
//! is reproduced exactly; see [`EventName`].
//!
//! # Directions
//!
//! - [`ClientRequest`]: events the client emits (`join`, `init_chat`, ...)
//! - [`ServerEvent`]: events the client receives (`aes_key_exchange`, ...)
//!
//! Unknown payload fields are ignored on decode and optional fields are
//! omitted on encode, so an unmodified server sees the shapes it expects.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod packet;
pub mod payloads;
pub mod peer;

pub use errors::{ProtocolError, Result};
pub use packet::{EventName, Packet};
pub use payloads::{ClientRequest, ServerEvent};
pub use peer::PeerId;

/// Sentinel value of `encrypted_aes_key` meaning "the server still holds a
/// valid session for this pair; reuse it".
pub const REUSE_EXISTING: &str = "reuse_existing";
