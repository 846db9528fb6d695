//! Client events and actions.

use parley_core::NoticeLevel;
use parley_proto::{ClientRequest, PeerId, ServerEvent};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Receiving server events from the transport
/// - Reporting transport (re)connection
/// - Driving time forward via ticks
/// - Forwarding user intents (select a peer, send a message)
///
/// Generic over `I` (Instant type) to support both production
/// (`std::time::Instant`) and simulation (virtual clock) environments.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// User opened the conversation with `peer`.
    SelectPeer {
        /// Peer to chat with.
        peer: PeerId,
    },

    /// User submitted a message to the active peer.
    SendMessage {
        /// Text as typed.
        text: String,
    },

    /// User asked for the unread backlog of `peer`.
    LoadUnreadMessages {
        /// Peer whose backlog to load.
        peer: PeerId,
    },

    /// Event received from the server or the transport.
    Received(ServerEvent),

    /// Transport (re)connected.
    Connected,

    /// Time tick for timeout processing.
    Tick {
        /// Current time from the environment.
        now: I,
    },
}

/// A system notice for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub text: String,
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Put a request on the wire.
    Send(ClientRequest),

    /// Enable or disable the send control.
    SendEnabled(bool),

    /// Show a system notice. Already appended to the conversation.
    Notice(Notice),

    /// A peer's unread indicator was raised or cleared.
    UnreadChanged {
        /// Peer whose indicator changed.
        peer: PeerId,
        /// Whether the indicator is now up.
        unread: bool,
    },

    /// Conversation changed; redraw it.
    Render,
}
