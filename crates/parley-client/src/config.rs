//! Client configuration.

use std::time::Duration;

use parley_proto::PeerId;

/// Client configuration.
///
/// Timeouts default to `None`: a key exchange or verification that never
/// gets a reply waits indefinitely.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Local user.
    pub local_user: PeerId,
    /// Peers shown in the directory from the start.
    pub peers: Vec<PeerId>,
    /// Fail a session still `Requesting` after this long.
    pub key_exchange_timeout: Option<Duration>,
    /// Discard a message still pending verification after this long.
    pub verification_timeout: Option<Duration>,
    /// Seal message bodies with the session key when one was negotiated.
    pub end_to_end: bool,
}

impl ClientConfig {
    /// Configuration for `local_user` with defaults for everything else.
    pub fn new(local_user: impl Into<PeerId>) -> Self {
        Self {
            local_user: local_user.into(),
            peers: Vec::new(),
            key_exchange_timeout: None,
            verification_timeout: None,
            end_to_end: false,
        }
    }

    /// Seed the peer directory.
    #[must_use]
    pub fn with_peers(mut self, peers: impl IntoIterator<Item = impl Into<PeerId>>) -> Self {
        self.peers = peers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the key exchange timeout.
    #[must_use]
    pub fn with_key_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.key_exchange_timeout = Some(timeout);
        self
    }

    /// Set the verification timeout.
    #[must_use]
    pub fn with_verification_timeout(mut self, timeout: Duration) -> Self {
        self.verification_timeout = Some(timeout);
        self
    }

    /// Enable end-to-end sealing of message bodies.
    #[must_use]
    pub fn with_end_to_end(mut self, enabled: bool) -> Self {
        self.end_to_end = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("anonymous")
    }
}
