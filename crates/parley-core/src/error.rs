//! Error taxonomy for the session and message state machines.
//!
//! Every failure here is recoverable: user-visible errors become inline system
//! notices in the conversation, and stale events are dropped silently. None
//! of them terminate the client.

use parley_crypto::CryptoError;
use parley_proto::{PeerId, ProtocolError};
use thiserror::Error;

use crate::session::SessionState;

/// Why a send was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    /// Message was empty or whitespace-only.
    EmptyMessage,
    /// No peer is selected.
    NoActivePeer,
    /// The active session is not established.
    SessionNotEstablished(SessionState),
    /// End-to-end sealing is on but the session holds no key.
    NoSessionKey,
}

/// Errors produced by the core state machines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Send attempted while not ready; nothing was emitted
    #[error("not ready to send: {reason:?}")]
    NotReady {
        /// What blocked the send
        reason: NotReadyReason,
    },

    /// Session key could not be established; the session is `Failed`
    #[error("key exchange with {peer} failed: {reason}")]
    KeyExchangeFailure {
        /// Peer the session is with
        peer: PeerId,
        /// Failure description
        reason: String,
    },

    /// A received message failed verification and was discarded
    #[error("verification of message from {peer} failed: {reason}")]
    VerificationFailure {
        /// Sender of the discarded message
        peer: PeerId,
        /// Failure description
        reason: String,
    },

    /// Reply for a peer or request that is no longer current
    #[error("ignored stale {event} for {peer}")]
    StaleEventIgnored {
        /// Wire event that was ignored
        event: &'static str,
        /// Subject peer of the event
        peer: PeerId,
    },

    /// Transport connection lost; the active session is not sendable
    #[error("transport disconnected")]
    TransportDisconnected,

    /// Malformed protocol data
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local encryption failed; nothing was emitted
    #[error("crypto error: {0}")]
    Crypto(String),
}

impl CoreError {
    /// Whether the user should see this error as a notice.
    ///
    /// Stale events are a correctness guard, not a failure. Empty sends and
    /// sends without a selected peer are silently ignored, as clicking send
    /// on an empty box should be.
    pub fn is_user_visible(&self) -> bool {
        match self {
            Self::NotReady { reason } => {
                matches!(
                    reason,
                    NotReadyReason::SessionNotEstablished(_) | NotReadyReason::NoSessionKey
                )
            },
            Self::StaleEventIgnored { .. } => false,
            Self::KeyExchangeFailure { .. }
            | Self::VerificationFailure { .. }
            | Self::TransportDisconnected
            | Self::Protocol(_)
            | Self::Crypto(_) => true,
        }
    }

    /// Text of the inline system notice for this error.
    pub fn notice_text(&self) -> String {
        match self {
            Self::NotReady { .. } => "Secure connection not established yet. Please wait.".into(),
            Self::KeyExchangeFailure { .. } => "Error establishing secure connection".into(),
            Self::VerificationFailure { .. } => "Message verification failed".into(),
            Self::TransportDisconnected => {
                "Disconnected from server. Trying to reconnect...".into()
            },
            Self::StaleEventIgnored { .. } | Self::Protocol(_) | Self::Crypto(_) => {
                self.to_string()
            },
        }
    }
}

impl From<ProtocolError> for CoreError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<CryptoError> for CoreError {
    fn from(err: CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl CoreError {
    /// Wrap a crypto failure during key exchange with `peer`.
    pub fn key_exchange(peer: PeerId, err: &CryptoError) -> Self {
        Self::KeyExchangeFailure { peer, reason: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_events_are_silent() {
        let err = CoreError::StaleEventIgnored { event: "message_status", peer: "bob".into() };
        assert!(!err.is_user_visible());
    }

    #[test]
    fn only_unestablished_sends_are_noticed() {
        let silent = CoreError::NotReady { reason: NotReadyReason::EmptyMessage };
        assert!(!silent.is_user_visible());

        let silent = CoreError::NotReady { reason: NotReadyReason::NoActivePeer };
        assert!(!silent.is_user_visible());

        let noticed = CoreError::NotReady {
            reason: NotReadyReason::SessionNotEstablished(SessionState::Requesting),
        };
        assert!(noticed.is_user_visible());
        assert_eq!(noticed.notice_text(), "Secure connection not established yet. Please wait.");

        let keyless = CoreError::NotReady { reason: NotReadyReason::NoSessionKey };
        assert!(keyless.is_user_visible());
    }

    #[test]
    fn failures_are_noticed() {
        assert!(CoreError::TransportDisconnected.is_user_visible());
        assert!(
            CoreError::KeyExchangeFailure { peer: "bob".into(), reason: "bad".into() }
                .is_user_visible()
        );
        assert_eq!(
            CoreError::VerificationFailure { peer: "bob".into(), reason: "bad".into() }
                .notice_text(),
            "Message verification failed"
        );
    }
}
