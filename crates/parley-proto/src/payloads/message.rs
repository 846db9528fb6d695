//! Message exchange payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::PeerId;

/// Status string the server uses for a successful verification.
pub const STATUS_SUCCESS: &str = "success";

/// Status string the server uses for a delivered message.
pub const STATUS_DELIVERED: &str = "delivered";

/// `send_message`: submit a message to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    /// Recipient.
    pub receiver: PeerId,
    /// Message body: plaintext, or base64 ciphertext when sealed.
    pub message: String,
    /// Correlation id echoed back in `message_status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u64>,
}

/// `receive_message`: an inbound message that still needs verification.
///
/// The server's envelope (`iv`, `cipher`, `hash`, `signature`) is opaque to
/// the client; it is kept only so it can be echoed back verbatim in
/// `verify_message`. Fields this version does not know about are preserved
/// in `extra` for the same reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    /// Sender of the message.
    pub sender: PeerId,
    /// Inline message body, if the server includes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Initialization vector (base64).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    /// Ciphertext (base64).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    /// Hex digest over `iv || cipher`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Sender signature (base64).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Any other fields, echoed back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReceivedMessage {
    /// Minimal inbound message with only a sender and inline body.
    pub fn inline(sender: PeerId, message: impl Into<String>) -> Self {
        Self {
            sender,
            message: Some(message.into()),
            iv: None,
            cipher: None,
            hash: None,
            signature: None,
            extra: Map::new(),
        }
    }
}

/// `verify_message`: the full received event plus a correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyMessage {
    /// The received event, echoed verbatim.
    #[serde(flatten)]
    pub received: ReceivedMessage,
    /// Correlation id echoed back in `message_verified`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
}

/// `message_verified`: verification outcome for a received message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageVerified {
    /// Sender of the verified message.
    pub sender: PeerId,
    /// `"success"` or a failure status.
    pub status: String,
    /// Authenticated payload on success; failure description otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Correlation id from the matching `verify_message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
}

impl MessageVerified {
    /// Whether the server authenticated the message.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// `message_status`: delivery outcome for an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStatus {
    /// Recipient of the original message.
    pub receiver: PeerId,
    /// `"delivered"` or a failure status.
    pub status: String,
    /// Delivered plaintext, if echoed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Failure description, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Correlation id from the matching `send_message`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<u64>,
}

impl MessageStatus {
    /// Whether the message reached its recipient.
    pub fn is_delivered(&self) -> bool {
        self.status == STATUS_DELIVERED
    }
}
