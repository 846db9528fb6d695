//! Standard client invariants.

use parley_core::SessionState;

use super::{ClientSnapshot, Invariant, InvariantResult};

/// The active peer never carries an unread mark.
///
/// Messages from the open conversation are shown directly, so a mark on the
/// active peer could never be cleared by looking at it.
pub struct ActivePeerNeverUnread;

impl Invariant for ActivePeerNeverUnread {
    fn name(&self) -> &'static str {
        "active_peer_never_unread"
    }

    fn check(&self, client: &ClientSnapshot) -> InvariantResult {
        match &client.active_peer {
            Some(active) if client.unread.contains(active) => {
                Err(format!("active peer {active} is marked unread"))
            },
            _ => Ok(()),
        }
    }
}

/// Sending is enabled only while the active session is established.
pub struct SendImpliesEstablished;

impl Invariant for SendImpliesEstablished {
    fn name(&self) -> &'static str {
        "send_implies_established"
    }

    fn check(&self, client: &ClientSnapshot) -> InvariantResult {
        if !client.can_send {
            return Ok(());
        }
        let state = client.active_peer.as_ref().and_then(|peer| client.session_state(peer));
        if state == Some(SessionState::Established) {
            Ok(())
        } else {
            Err(format!("send enabled for {:?} in state {state:?}", client.active_peer))
        }
    }
}

/// The active peer has exactly one session, and the conversation on screen
/// belongs to it.
pub struct SingleActiveSession;

impl Invariant for SingleActiveSession {
    fn name(&self) -> &'static str {
        "single_active_session"
    }

    fn check(&self, client: &ClientSnapshot) -> InvariantResult {
        let Some(active) = &client.active_peer else {
            return Ok(());
        };

        let sessions = client.sessions.iter().filter(|(peer, _)| peer == active).count();
        if sessions != 1 {
            return Err(format!("active peer {active} has {sessions} sessions"));
        }
        if client.conversation_peer.as_ref() != Some(active) {
            return Err(format!(
                "conversation shows {:?} while {active} is active",
                client.conversation_peer
            ));
        }
        Ok(())
    }
}

/// Entries awaiting verification only come from the active peer.
pub struct PendingOnlyForActivePeer;

impl Invariant for PendingOnlyForActivePeer {
    fn name(&self) -> &'static str {
        "pending_only_for_active_peer"
    }

    fn check(&self, client: &ClientSnapshot) -> InvariantResult {
        let active = client.active_peer.as_ref();
        match client.pending_senders.iter().find(|sender| Some(*sender) != active) {
            Some(stray) => Err(format!("pending entry from {stray} while {active:?} is active")),
            None => Ok(()),
        }
    }
}
