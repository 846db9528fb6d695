//! Per-peer unread indicators.

use std::collections::HashMap;

use parley_proto::PeerId;

/// Result of marking a peer unread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreadMark {
    /// The indicator was raised by this mark
    Raised,
    /// The indicator was already up; only the count changed
    AlreadyRaised,
}

/// Tracks which peers have unseen inbound messages.
///
/// At most one indicator exists per peer. The tracker also counts the unseen
/// messages behind each indicator.
#[derive(Debug, Clone, Default)]
pub struct UnreadTracker {
    unseen: HashMap<PeerId, usize>,
}

impl UnreadTracker {
    /// Tracker with no unread peers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an unseen message from `peer`.
    pub fn mark_unread(&mut self, peer: &PeerId) -> UnreadMark {
        if let Some(count) = self.unseen.get_mut(peer) {
            *count += 1;
            return UnreadMark::AlreadyRaised;
        }
        self.unseen.insert(peer.clone(), 1);
        UnreadMark::Raised
    }

    /// Drop the indicator for `peer`. Returns whether one was up.
    pub fn clear(&mut self, peer: &PeerId) -> bool {
        self.unseen.remove(peer).is_some()
    }

    /// Whether `peer` has an indicator up.
    pub fn is_unread(&self, peer: &PeerId) -> bool {
        self.unseen.contains_key(peer)
    }

    /// Unseen messages from `peer`.
    pub fn unseen_count(&self, peer: &PeerId) -> usize {
        self.unseen.get(peer).copied().unwrap_or(0)
    }

    /// Peers with an indicator up, sorted.
    pub fn unread_peers(&self) -> Vec<&PeerId> {
        let mut peers: Vec<_> = self.unseen.keys().collect();
        peers.sort();
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_marks_raise_once() {
        let mut tracker = UnreadTracker::new();
        let alice = PeerId::new("alice");

        assert_eq!(tracker.mark_unread(&alice), UnreadMark::Raised);
        assert_eq!(tracker.mark_unread(&alice), UnreadMark::AlreadyRaised);
        assert_eq!(tracker.unread_peers(), vec![&alice]);
        assert_eq!(tracker.unseen_count(&alice), 2);
    }

    #[test]
    fn clear_drops_indicator() {
        let mut tracker = UnreadTracker::new();
        let alice = PeerId::new("alice");
        tracker.mark_unread(&alice);

        assert!(tracker.clear(&alice));
        assert!(!tracker.is_unread(&alice));
        assert_eq!(tracker.unseen_count(&alice), 0);
        assert!(!tracker.clear(&alice));
    }
}
