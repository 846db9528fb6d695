//! Typed event payloads.
//!
//! [`ClientRequest`] and [`ServerEvent`] split the wire contract by direction.
//! Each variant maps to exactly one [`EventName`] (enforced by match
//! exhaustiveness), and converting through a [`Packet`] preserves the value.

pub mod message;
pub mod session;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    EventName, Packet, PeerId,
    errors::{ProtocolError, Result},
};

/// Events the client emits to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Register this client's session room
    Join,
    /// Request session establishment with a peer
    InitChat(session::InitChat),
    /// Submit a message
    SendMessage(message::SendMessage),
    /// Ask the server to authenticate a received message
    VerifyMessage(message::VerifyMessage),
    /// Request the unread backlog for a peer
    LoadUnreadMessages(session::LoadUnreadMessages),
}

/// Events the client receives from the server or the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Session key material or the reuse sentinel
    KeyExchange(session::KeyExchange),
    /// Inbound message awaiting verification
    ReceiveMessage(message::ReceivedMessage),
    /// Verification outcome
    MessageVerified(message::MessageVerified),
    /// Delivery outcome
    MessageStatus(message::MessageStatus),
    /// Generic server-side error
    ChatError(session::ChatError),
    /// Unread backlog
    UnreadMessages(session::UnreadMessages),
    /// Transport failed to connect
    ConnectError,
    /// Transport disconnected
    Disconnect,
}

impl ClientRequest {
    /// Event name for this request.
    #[must_use]
    pub const fn event(&self) -> EventName {
        match self {
            Self::Join => EventName::Join,
            Self::InitChat(_) => EventName::InitChat,
            Self::SendMessage(_) => EventName::SendMessage,
            Self::VerifyMessage(_) => EventName::VerifyMessage,
            Self::LoadUnreadMessages(_) => EventName::LoadUnreadMessages,
        }
    }

    /// Peer this request concerns, if any.
    pub fn peer(&self) -> Option<&PeerId> {
        match self {
            Self::Join => None,
            Self::InitChat(inner) => Some(&inner.receiver),
            Self::SendMessage(inner) => Some(&inner.receiver),
            Self::VerifyMessage(inner) => Some(&inner.received.sender),
            Self::LoadUnreadMessages(inner) => Some(&inner.sender),
        }
    }

    /// Convert into a transport packet.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonEncode` if serialization fails
    pub fn into_packet(self) -> Result<Packet> {
        let event = self.event();
        let payload = match self {
            Self::Join => None,
            Self::InitChat(inner) => Some(to_value(&inner)?),
            Self::SendMessage(inner) => Some(to_value(&inner)?),
            Self::VerifyMessage(inner) => Some(to_value(&inner)?),
            Self::LoadUnreadMessages(inner) => Some(to_value(&inner)?),
        };
        Ok(Packet::new(event, payload))
    }

    /// Parse a request from a transport packet.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::WrongDirection` if the packet is a server event
    /// - `ProtocolError::MissingPayload` / `JsonDecode` on malformed payloads
    pub fn from_packet(packet: Packet) -> Result<Self> {
        let event = packet.event;
        let request = match event {
            EventName::Join => Self::Join,
            EventName::InitChat => Self::InitChat(from_payload(event, packet.payload)?),
            EventName::SendMessage => Self::SendMessage(from_payload(event, packet.payload)?),
            EventName::VerifyMessage => Self::VerifyMessage(from_payload(event, packet.payload)?),
            EventName::LoadUnreadMessages => {
                Self::LoadUnreadMessages(from_payload(event, packet.payload)?)
            },
            EventName::AesKeyExchange
            | EventName::ReceiveMessage
            | EventName::MessageVerified
            | EventName::MessageStatus
            | EventName::ChatError
            | EventName::UnreadMessages
            | EventName::ConnectError
            | EventName::Disconnect => {
                return Err(ProtocolError::WrongDirection { event: event.as_str() });
            },
        };
        Ok(request)
    }
}

impl ServerEvent {
    /// Event name for this server event.
    #[must_use]
    pub const fn event(&self) -> EventName {
        match self {
            Self::KeyExchange(_) => EventName::AesKeyExchange,
            Self::ReceiveMessage(_) => EventName::ReceiveMessage,
            Self::MessageVerified(_) => EventName::MessageVerified,
            Self::MessageStatus(_) => EventName::MessageStatus,
            Self::ChatError(_) => EventName::ChatError,
            Self::UnreadMessages(_) => EventName::UnreadMessages,
            Self::ConnectError => EventName::ConnectError,
            Self::Disconnect => EventName::Disconnect,
        }
    }

    /// Convert into a transport packet.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::JsonEncode` if serialization fails
    pub fn into_packet(self) -> Result<Packet> {
        let event = self.event();
        let payload = match self {
            Self::KeyExchange(inner) => Some(to_value(&inner)?),
            Self::ReceiveMessage(inner) => Some(to_value(&inner)?),
            Self::MessageVerified(inner) => Some(to_value(&inner)?),
            Self::MessageStatus(inner) => Some(to_value(&inner)?),
            Self::ChatError(inner) => Some(to_value(&inner)?),
            Self::UnreadMessages(inner) => Some(to_value(&inner)?),
            Self::ConnectError | Self::Disconnect => None,
        };
        Ok(Packet::new(event, payload))
    }

    /// Parse a server event from a transport packet.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::WrongDirection` if the packet is a client request
    /// - `ProtocolError::MissingPayload` / `JsonDecode` on malformed payloads
    pub fn from_packet(packet: Packet) -> Result<Self> {
        let event = packet.event;
        let server_event = match event {
            EventName::AesKeyExchange => Self::KeyExchange(from_payload(event, packet.payload)?),
            EventName::ReceiveMessage => Self::ReceiveMessage(from_payload(event, packet.payload)?),
            EventName::MessageVerified => {
                Self::MessageVerified(from_payload(event, packet.payload)?)
            },
            EventName::MessageStatus => Self::MessageStatus(from_payload(event, packet.payload)?),
            EventName::ChatError => Self::ChatError(from_payload(event, packet.payload)?),
            EventName::UnreadMessages => Self::UnreadMessages(from_payload(event, packet.payload)?),
            EventName::ConnectError => Self::ConnectError,
            EventName::Disconnect => Self::Disconnect,
            EventName::Join
            | EventName::InitChat
            | EventName::SendMessage
            | EventName::VerifyMessage
            | EventName::LoadUnreadMessages => {
                return Err(ProtocolError::WrongDirection { event: event.as_str() });
            },
        };
        Ok(server_event)
    }

    /// Decode a server event straight from packet bytes.
    ///
    /// # Errors
    ///
    /// Any error from [`Packet::decode`] or [`ServerEvent::from_packet`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_packet(Packet::decode(bytes)?)
    }
}

fn to_value<T: Serialize>(inner: &T) -> Result<Value> {
    serde_json::to_value(inner).map_err(|e| ProtocolError::JsonEncode(e.to_string()))
}

fn from_payload<T: DeserializeOwned>(event: EventName, payload: Option<Value>) -> Result<T> {
    let value = payload.ok_or(ProtocolError::MissingPayload { event: event.as_str() })?;
    serde_json::from_value(value)
        .map_err(|e| ProtocolError::JsonDecode { event: event.as_str(), reason: e.to_string() })
}
