//! Point-in-time copies of client state for invariant checks.
//!
//! Invariants operate on snapshots rather than live state so every check in
//! a pass sees the same state.

use parley_client::Client;
use parley_core::{Environment, SessionState};
use parley_crypto::CryptoProvider;
use parley_proto::PeerId;

/// Every client of a simulated world, captured at the same step.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// One snapshot per client, in world order.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// A world with no clients.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A world of one client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// A world of `clients`.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }

    /// Snapshot of the client logged in as `id`.
    pub fn client(&self, id: &PeerId) -> Option<&ClientSnapshot> {
        self.clients.iter().find(|client| &client.id == id)
    }
}

impl FromIterator<ClientSnapshot> for SystemSnapshot {
    fn from_iter<T: IntoIterator<Item = ClientSnapshot>>(iter: T) -> Self {
        Self { clients: iter.into_iter().collect() }
    }
}

/// Snapshot of a single client's observable state.
#[derive(Debug, Clone)]
pub struct ClientSnapshot {
    /// Local user.
    pub id: PeerId,
    /// Whether the transport is up.
    pub connected: bool,
    /// Peer of the open conversation.
    pub active_peer: Option<PeerId>,
    /// Whether sending is enabled.
    pub can_send: bool,
    /// Every session in the table with its state.
    pub sessions: Vec<(PeerId, SessionState)>,
    /// Peers with the unread mark raised.
    pub unread: Vec<PeerId>,
    /// Peer the conversation buffer belongs to.
    pub conversation_peer: Option<PeerId>,
    /// Senders of inbound entries still awaiting verification.
    pub pending_senders: Vec<PeerId>,
}

impl ClientSnapshot {
    /// Empty snapshot for `id`.
    pub fn new(id: impl Into<PeerId>) -> Self {
        Self {
            id: id.into(),
            connected: false,
            active_peer: None,
            can_send: false,
            sessions: Vec::new(),
            unread: Vec::new(),
            conversation_peer: None,
            pending_senders: Vec::new(),
        }
    }

    /// Capture a live client.
    pub fn from_client<E: Environment, C: CryptoProvider>(client: &Client<E, C>) -> Self {
        Self {
            id: client.local_user().clone(),
            connected: client.is_connected(),
            active_peer: client.active_peer().cloned(),
            can_send: client.can_send(),
            sessions: client
                .sessions()
                .sessions()
                .map(|s| (s.peer().clone(), s.state()))
                .collect(),
            unread: client.unread().unread_peers().into_iter().cloned().collect(),
            conversation_peer: client.conversation().peer().cloned(),
            pending_senders: client.conversation().pending().map(|m| m.sender().clone()).collect(),
        }
    }

    /// Set the active peer. Also adopts it as the conversation peer.
    pub fn with_active_peer(mut self, peer: Option<PeerId>) -> Self {
        self.conversation_peer.clone_from(&peer);
        self.active_peer = peer;
        self
    }

    /// Add a session.
    pub fn with_session(mut self, peer: impl Into<PeerId>, state: SessionState) -> Self {
        self.sessions.push((peer.into(), state));
        self
    }

    /// Set whether sending is enabled.
    pub fn with_can_send(mut self, can_send: bool) -> Self {
        self.can_send = can_send;
        self
    }

    /// Raise unread marks.
    pub fn with_unread<P: Into<PeerId>>(mut self, peers: impl IntoIterator<Item = P>) -> Self {
        self.unread.extend(peers.into_iter().map(Into::into));
        self
    }

    /// Add a pending inbound entry from `sender`.
    pub fn with_pending(mut self, sender: impl Into<PeerId>) -> Self {
        self.pending_senders.push(sender.into());
        self
    }

    /// State of the session with `peer`, if any.
    pub fn session_state(&self, peer: &PeerId) -> Option<SessionState> {
        self.sessions.iter().find(|(p, _)| p == peer).map(|(_, state)| *state)
    }
}
