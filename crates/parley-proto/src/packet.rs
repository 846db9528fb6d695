//! Event packets.
//!
//! A packet is the unit the transport channel carries: an event name plus an
//! optional JSON payload, encoded as `["<event>", <payload>]`. Payload-less
//! events (`join`, `disconnect`, ...) encode as `["<event>"]`.

use serde_json::Value;

use crate::errors::{ProtocolError, Result};

/// Names of every event in the wire contract.
///
/// The string form returned by [`EventName::as_str`] must match the deployed
/// server exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    // Outbound (client -> server)
    /// Register this client's session room
    Join,
    /// Request session establishment with a peer
    InitChat,
    /// Submit a message
    SendMessage,
    /// Ask the server to authenticate a received message
    VerifyMessage,
    /// Request the unread backlog for a peer
    LoadUnreadMessages,

    // Inbound (server -> client)
    /// Session key material or the reuse sentinel
    AesKeyExchange,
    /// Inbound message awaiting verification
    ReceiveMessage,
    /// Verification outcome
    MessageVerified,
    /// Delivery outcome for an outbound message
    MessageStatus,
    /// Generic server-side error notice
    ChatError,
    /// Unread backlog reply
    UnreadMessages,
    /// Transport failed to connect
    ConnectError,
    /// Transport disconnected
    Disconnect,
}

impl EventName {
    /// All event names, outbound first.
    pub const ALL: [Self; 13] = [
        Self::Join,
        Self::InitChat,
        Self::SendMessage,
        Self::VerifyMessage,
        Self::LoadUnreadMessages,
        Self::AesKeyExchange,
        Self::ReceiveMessage,
        Self::MessageVerified,
        Self::MessageStatus,
        Self::ChatError,
        Self::UnreadMessages,
        Self::ConnectError,
        Self::Disconnect,
    ];

    /// Wire name of this event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::InitChat => "init_chat",
            Self::SendMessage => "send_message",
            Self::VerifyMessage => "verify_message",
            Self::LoadUnreadMessages => "load_unread_messages",
            Self::AesKeyExchange => "aes_key_exchange",
            Self::ReceiveMessage => "receive_message",
            Self::MessageVerified => "message_verified",
            Self::MessageStatus => "message_status",
            Self::ChatError => "chat_error",
            Self::UnreadMessages => "unread_messages",
            Self::ConnectError => "connect_error",
            Self::Disconnect => "disconnect",
        }
    }

    /// Look up an event by its wire name. `None` for unknown names.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|event| event.as_str() == name)
    }

    /// Whether the client emits this event (as opposed to receiving it).
    #[must_use]
    pub const fn is_outbound(self) -> bool {
        matches!(
            self,
            Self::Join
                | Self::InitChat
                | Self::SendMessage
                | Self::VerifyMessage
                | Self::LoadUnreadMessages
        )
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named event with its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    /// Event name.
    pub event: EventName,
    /// Payload. `None` for payload-less events.
    pub payload: Option<Value>,
}

impl Packet {
    /// Create a packet.
    pub fn new(event: EventName, payload: Option<Value>) -> Self {
        Self { event, payload }
    }

    /// Encode as a JSON array.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonEncode` if serialization fails
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut items = vec![Value::String(self.event.as_str().to_string())];
        if let Some(payload) = &self.payload {
            items.push(payload.clone());
        }
        serde_json::to_vec(&Value::Array(items)).map_err(|e| ProtocolError::JsonEncode(e.to_string()))
    }

    /// Decode from a JSON array.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::MalformedPacket` if the bytes are not `[string, any?]`
    /// - `ProtocolError::UnknownEvent` if the event name is not in the contract
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::MalformedPacket(e.to_string()))?;

        let Value::Array(mut items) = value else {
            return Err(ProtocolError::MalformedPacket("expected a JSON array".to_string()));
        };

        if items.is_empty() || items.len() > 2 {
            return Err(ProtocolError::MalformedPacket(format!(
                "expected 1 or 2 elements, got {}",
                items.len()
            )));
        }

        let payload = if items.len() == 2 { items.pop() } else { None };
        let Some(Value::String(name)) = items.pop() else {
            return Err(ProtocolError::MalformedPacket("event name must be a string".to_string()));
        };

        let event = EventName::from_wire(&name).ok_or(ProtocolError::UnknownEvent(name))?;
        Ok(Self { event, payload: payload.filter(|p| !p.is_null()) })
    }
}
