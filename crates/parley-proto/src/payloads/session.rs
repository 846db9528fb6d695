//! Session establishment and bookkeeping payloads.

use serde::{Deserialize, Serialize};

use crate::{PeerId, REUSE_EXISTING, payloads::message::ReceivedMessage};

/// `init_chat`: request session establishment with a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitChat {
    /// Peer to establish a session with.
    pub receiver: PeerId,
    /// Ask for new key material even if the server holds a session.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fresh_key: bool,
}

impl InitChat {
    /// Request a session with `receiver`, accepting reuse.
    pub fn new(receiver: PeerId) -> Self {
        Self { receiver, fresh_key: false }
    }

    /// Request a session with `receiver` that must carry a new key.
    pub fn fresh(receiver: PeerId) -> Self {
        Self { receiver, fresh_key: true }
    }
}

/// `aes_key_exchange`: key material for a session, or the reuse sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchange {
    /// Peer the session is with.
    pub sender: PeerId,
    /// Wrapped session key (base64), or [`REUSE_EXISTING`].
    pub encrypted_aes_key: String,
    /// Signature over the session metadata (base64), or [`REUSE_EXISTING`].
    #[serde(default)]
    pub signature: String,
}

impl KeyExchange {
    /// Server-directed fast path: the existing session is still valid.
    pub fn reuse(sender: PeerId) -> Self {
        Self {
            sender,
            encrypted_aes_key: REUSE_EXISTING.to_string(),
            signature: REUSE_EXISTING.to_string(),
        }
    }

    /// Whether this exchange carries the reuse sentinel instead of key
    /// material.
    pub fn is_reuse(&self) -> bool {
        self.encrypted_aes_key == REUSE_EXISTING
    }
}

/// `load_unread_messages`: request the unread backlog from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadUnreadMessages {
    /// Peer whose messages to load.
    pub sender: PeerId,
}

/// `unread_messages`: unread backlog from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadMessages {
    /// Peer the backlog is from.
    pub sender: PeerId,
    /// Backlog entries, oldest first.
    #[serde(default)]
    pub messages: Vec<ReceivedMessage>,
}

/// `chat_error`: generic server-side error notice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatError {
    /// Human-readable error message.
    pub message: String,
}
