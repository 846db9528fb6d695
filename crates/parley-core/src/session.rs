//! Per-peer session state machines.
//!
//! [`SessionManager`] is the single writer of the session table and of the
//! active-peer selection. Everything else reads them through `&SessionManager`.
//!
//! ```text
//!            select_peer
//!   Idle ──────────────────► Requesting ──── key ok / reuse ───► Established
//!                              │   ▲                                  │
//!                   key failed │   │ reconnect             disconnect │
//!                  or timeout  ▼   │                                  ▼
//!                            Failed  AwaitingKey ◄────────────────────┘
//! ```
//!
//! Selecting a peer again from any state re-enters `Requesting` and discards
//! the session key.

use std::{collections::HashMap, time::Duration};

use parley_crypto::{CryptoProvider, SessionKey};
use parley_proto::{
    EventName, PeerId,
    payloads::session::{InitChat, KeyExchange},
};
use tracing::{debug, info, warn};

use crate::{env::Timestamp, error::CoreError};

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, never requested
    Idle,
    /// `init_chat` sent, waiting for key material
    Requesting,
    /// Transport lost; re-requested on reconnect
    AwaitingKey,
    /// Ready to send
    Established,
    /// Key exchange failed; needs a new selection
    Failed,
}

/// Session with one peer.
#[derive(Debug)]
pub struct Session<I> {
    peer: PeerId,
    state: SessionState,
    key: Option<SessionKey>,
    requested_at: Option<I>,
    activated_at: Option<I>,
    fresh_key_requested: bool,
}

impl<I: Timestamp> Session<I> {
    fn new(peer: PeerId) -> Self {
        Self {
            peer,
            state: SessionState::Idle,
            key: None,
            requested_at: None,
            activated_at: None,
            fresh_key_requested: false,
        }
    }

    /// Peer this session is with.
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session key. `None` before establishment and on the reuse path.
    pub fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    /// When the session was last requested.
    pub fn requested_at(&self) -> Option<I> {
        self.requested_at
    }

    /// When the session last became established.
    pub fn activated_at(&self) -> Option<I> {
        self.activated_at
    }

    fn request(&mut self, now: I) {
        self.state = SessionState::Requesting;
        self.key = None;
        self.requested_at = Some(now);
        self.activated_at = None;
        self.fresh_key_requested = false;
    }

    fn establish(&mut self, key: Option<SessionKey>, now: I) {
        self.state = SessionState::Established;
        self.fresh_key_requested = false;
        if key.is_some() {
            self.key = key;
        }
        self.activated_at = Some(now);
    }

    fn fail(&mut self) {
        self.state = SessionState::Failed;
        self.key = None;
        self.activated_at = None;
    }
}

/// How a key exchange completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeOutcome {
    /// Server said the existing session is still valid
    Reused,
    /// A fresh session key was unwrapped
    Established,
}

/// Owner of every session and of the active selection.
#[derive(Debug)]
pub struct SessionManager<I> {
    local: PeerId,
    sessions: HashMap<PeerId, Session<I>>,
    active: Option<PeerId>,
}

impl<I: Timestamp> SessionManager<I> {
    /// Manager for `local` with no sessions.
    pub fn new(local: PeerId) -> Self {
        Self { local, sessions: HashMap::new(), active: None }
    }

    /// Local user.
    pub fn local(&self) -> &PeerId {
        &self.local
    }

    /// Currently selected peer.
    pub fn active_peer(&self) -> Option<&PeerId> {
        self.active.as_ref()
    }

    /// Whether `peer` is the selected peer.
    pub fn is_active(&self, peer: &PeerId) -> bool {
        self.active.as_ref() == Some(peer)
    }

    /// Session for the selected peer.
    pub fn active_session(&self) -> Option<&Session<I>> {
        self.active.as_ref().and_then(|peer| self.sessions.get(peer))
    }

    /// Session with `peer`, if one was ever created.
    pub fn session(&self, peer: &PeerId) -> Option<&Session<I>> {
        self.sessions.get(peer)
    }

    /// All sessions.
    pub fn sessions(&self) -> impl Iterator<Item = &Session<I>> {
        self.sessions.values()
    }

    /// Whether a message may be sent to the selected peer.
    pub fn can_send(&self) -> bool {
        self.active_session().is_some_and(|s| s.state == SessionState::Established)
    }

    /// Key of the selected peer's established session.
    pub fn active_key(&self) -> Option<&SessionKey> {
        self.active_session().filter(|s| s.state == SessionState::Established)?.key()
    }

    /// Select `peer` and start (re-)negotiating its session.
    ///
    /// Any previous key for `peer` is discarded. Returns the `init_chat`
    /// request to emit.
    pub fn select_peer(&mut self, peer: PeerId, now: I) -> InitChat {
        let session =
            self.sessions.entry(peer.clone()).or_insert_with(|| Session::new(peer.clone()));
        let previous = session.state;
        session.request(now);
        info!(peer = %peer, ?previous, "requesting session");

        self.active = Some(peer.clone());
        InitChat::new(peer)
    }

    /// Re-request the selected session, insisting on new key material.
    ///
    /// Only applies to an established session that holds no key, which is
    /// what the reuse path leaves behind. Returns the `init_chat` to emit.
    pub fn request_fresh_key(&mut self, now: I) -> Option<InitChat> {
        let peer = self.active.clone()?;
        let session = self.sessions.get_mut(&peer)?;
        if session.state != SessionState::Established || session.key.is_some() {
            return None;
        }
        session.request(now);
        session.fresh_key_requested = true;
        info!(peer = %peer, "requesting fresh session key");
        Some(InitChat::fresh(peer))
    }

    /// Apply an `aes_key_exchange` event.
    ///
    /// # Errors
    ///
    /// - `CoreError::StaleEventIgnored` if the sender is not the selected peer
    ///   or its session is not waiting for a key
    /// - `CoreError::KeyExchangeFailure` if the key could not be unwrapped, or
    ///   the server answered a fresh key request with reuse; the session is
    ///   now `Failed`
    pub fn on_key_exchange<C: CryptoProvider + ?Sized>(
        &mut self,
        exchange: &KeyExchange,
        crypto: &C,
        now: I,
    ) -> Result<KeyExchangeOutcome, CoreError> {
        let stale = || CoreError::StaleEventIgnored {
            event: EventName::AesKeyExchange.as_str(),
            peer: exchange.sender.clone(),
        };

        if !self.is_active(&exchange.sender) {
            debug!(sender = %exchange.sender, "key exchange for inactive peer");
            return Err(stale());
        }
        let session = self.sessions.get_mut(&exchange.sender).ok_or_else(stale)?;
        if !matches!(session.state, SessionState::Requesting | SessionState::Established) {
            debug!(sender = %exchange.sender, state = ?session.state, "key exchange not expected");
            return Err(stale());
        }

        if exchange.is_reuse() {
            if session.fresh_key_requested {
                session.fail();
                warn!(peer = %exchange.sender, "fresh key request answered with reuse");
                return Err(CoreError::KeyExchangeFailure {
                    peer: exchange.sender.clone(),
                    reason: "server reused the session instead of issuing a key".into(),
                });
            }
            session.establish(None, now);
            info!(peer = %exchange.sender, "session reused");
            return Ok(KeyExchangeOutcome::Reused);
        }

        match crypto.decrypt_session_key(
            &exchange.encrypted_aes_key,
            &exchange.signature,
            &exchange.sender,
        ) {
            Ok(key) => {
                session.establish(Some(key), now);
                info!(peer = %exchange.sender, "session established");
                Ok(KeyExchangeOutcome::Established)
            },
            Err(err) => {
                session.fail();
                warn!(peer = %exchange.sender, error = %err, "key exchange failed");
                Err(CoreError::key_exchange(exchange.sender.clone(), &err))
            },
        }
    }

    /// Force the selected session into a non-sendable state after the
    /// transport dropped.
    ///
    /// Returns the peer whose session was suspended.
    pub fn on_disconnect(&mut self) -> Option<PeerId> {
        let peer = self.active.clone()?;
        let session = self.sessions.get_mut(&peer)?;
        if !matches!(session.state, SessionState::Requesting | SessionState::Established) {
            return None;
        }
        session.state = SessionState::AwaitingKey;
        session.key = None;
        session.activated_at = None;
        info!(peer = %peer, "session suspended");
        Some(peer)
    }

    /// Re-request the selected session after the transport came back.
    ///
    /// Returns the `init_chat` to emit, if the session was suspended.
    pub fn on_reconnect(&mut self, now: I) -> Option<InitChat> {
        let peer = self.active.clone()?;
        let session = self.sessions.get_mut(&peer)?;
        if session.state != SessionState::AwaitingKey {
            return None;
        }
        session.request(now);
        info!(peer = %peer, "re-requesting session");
        Some(InitChat::new(peer))
    }

    /// Fail the selected session if its key exchange has been outstanding
    /// for at least `timeout`.
    ///
    /// # Errors
    ///
    /// - `CoreError::KeyExchangeFailure` if the session timed out
    pub fn expire_key_exchange(&mut self, now: I, timeout: Duration) -> Result<(), CoreError> {
        let Some(peer) = self.active.clone() else {
            return Ok(());
        };
        let Some(session) = self.sessions.get_mut(&peer) else {
            return Ok(());
        };
        if session.state != SessionState::Requesting {
            return Ok(());
        }
        let Some(requested_at) = session.requested_at else {
            return Ok(());
        };
        if now < requested_at || now - requested_at < timeout {
            return Ok(());
        }

        session.fail();
        warn!(peer = %peer, ?timeout, "key exchange timed out");
        Err(CoreError::KeyExchangeFailure {
            peer,
            reason: format!("no key received within {timeout:?}"),
        })
    }
}
