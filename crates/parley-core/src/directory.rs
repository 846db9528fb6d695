//! Known peers.

use parley_proto::PeerId;

/// Peers the user can chat with, in the order they became known.
///
/// Inbound messages from peers outside the directory are not tracked.
#[derive(Debug, Clone, Default)]
pub struct PeerDirectory {
    peers: Vec<PeerId>,
}

impl PeerDirectory {
    /// Directory seeded with `peers`. Duplicates are dropped.
    pub fn new(peers: impl IntoIterator<Item = PeerId>) -> Self {
        let mut directory = Self::default();
        for peer in peers {
            directory.register(peer);
        }
        directory
    }

    /// Add a peer. Returns `false` if it was already known.
    pub fn register(&mut self, peer: PeerId) -> bool {
        if self.contains(&peer) {
            return false;
        }
        self.peers.push(peer);
        true
    }

    /// Whether `peer` is known.
    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains(peer)
    }

    /// All known peers.
    pub fn peers(&self) -> &[PeerId] {
        &self.peers
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no peers are known.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut directory = PeerDirectory::new(["alice".into(), "bob".into(), "alice".into()]);
        assert_eq!(directory.len(), 2);
        assert!(!directory.register("bob".into()));
        assert!(directory.register("carol".into()));
        assert_eq!(directory.peers().last().map(PeerId::as_str), Some("carol"));
    }
}
