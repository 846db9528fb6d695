//! Error types for the Parley wire protocol.

use thiserror::Error;

/// Protocol-level errors raised while encoding or decoding packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet is not a JSON array of `[event, payload?]`
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// Event name is not part of the wire contract
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    /// Event is known but travels the other direction
    #[error("unexpected event {event} for this direction")]
    WrongDirection {
        /// Event that was received
        event: &'static str,
    },

    /// Event requires a payload but none was present
    #[error("missing payload for event {event}")]
    MissingPayload {
        /// Event missing its payload
        event: &'static str,
    },

    /// Failed to encode JSON
    #[error("failed to encode JSON: {0}")]
    JsonEncode(String),

    /// Failed to decode JSON
    #[error("failed to decode JSON for {event}: {reason}")]
    JsonDecode {
        /// Event being decoded
        event: &'static str,
        /// Decoder message
        reason: String,
    },
}

/// Convenient Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
