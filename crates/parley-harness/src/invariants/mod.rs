//! Client invariants for deterministic simulation testing.
//!
//! An invariant is a property of one client's observable state that holds
//! after every event, whatever the sequence. The harness captures each
//! client as a [`ClientSnapshot`] and runs every registered [`Invariant`]
//! against it; a [`SystemSnapshot`] is just the snapshots of all clients in
//! a world.
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.check_client(&ClientSnapshot::from_client(&client))?;
//! ```

mod checks;
mod snapshot;

use std::fmt;

use parley_proto::PeerId;

pub use checks::{
    ActivePeerNeverUnread, PendingOnlyForActivePeer, SendImpliesEstablished, SingleActiveSession,
};
pub use snapshot::{ClientSnapshot, SystemSnapshot};

/// Outcome of one invariant on one client. The error describes the breach.
pub type InvariantResult = Result<(), String>;

/// A broken invariant, attributed to the client it broke on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Client whose state broke it.
    pub client: PeerId,
    /// What was observed.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.client, self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A property of a single client's state.
pub trait Invariant: Send + Sync {
    /// Stable name used in violation reports.
    fn name(&self) -> &'static str;

    /// Check `client`, describing the breach on failure.
    fn check(&self, client: &ClientSnapshot) -> InvariantResult;
}

/// The set of invariants a simulation enforces.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.invariants.iter().map(|i| i.name())).finish()
    }
}

impl InvariantRegistry {
    /// Registry that checks nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every client invariant:
    /// [`ActivePeerNeverUnread`], [`SendImpliesEstablished`],
    /// [`SingleActiveSession`] and [`PendingOnlyForActivePeer`].
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(ActivePeerNeverUnread);
        registry.add(SendImpliesEstablished);
        registry.add(SingleActiveSession);
        registry.add(PendingOnlyForActivePeer);
        registry
    }

    /// Register `invariant`.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every invariant against one client.
    pub fn check_client(&self, client: &ClientSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> = self.violations(client).collect();
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Run every invariant against every client in `state`.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            state.clients.iter().flat_map(|client| self.violations(client)).collect();
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Like [`InvariantRegistry::check_all`], but panics with every
    /// violation. `context` says where in the run the check happened.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let lines: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("invariants broken {context}:\n  {}", lines.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether no invariants are registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }

    fn violations<'a>(&'a self, client: &'a ClientSnapshot) -> impl Iterator<Item = Violation> + 'a {
        self.invariants.iter().filter_map(move |invariant| {
            invariant.check(client).err().map(|message| Violation {
                invariant: invariant.name(),
                client: client.id.clone(),
                message,
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use parley_core::SessionState;

    use super::*;

    fn broken_alice() -> ClientSnapshot {
        ClientSnapshot::new("alice")
            .with_active_peer(Some("bob".into()))
            .with_session("bob", SessionState::Requesting)
            .with_unread(["bob"])
            .with_can_send(true)
    }

    #[test]
    fn empty_world_holds() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 4);
        assert!(registry.check_all(&SystemSnapshot::empty()).is_ok());
    }

    #[test]
    fn every_violation_is_reported() {
        let registry = InvariantRegistry::standard();

        let violations = registry.check_client(&broken_alice()).unwrap_err();

        let names: Vec<_> = violations.iter().map(|v| v.invariant).collect();
        assert_eq!(names, ["active_peer_never_unread", "send_implies_established"]);
        assert!(violations.iter().all(|v| v.client == "alice"));
    }

    #[test]
    fn violations_name_the_client() {
        let registry = InvariantRegistry::standard();
        let world = SystemSnapshot::from_clients(vec![ClientSnapshot::new("bob"), broken_alice()]);

        let violations = registry.check_all(&world).unwrap_err();

        assert!(violations.iter().all(|v| v.client == "alice"));
        assert!(violations[0].to_string().starts_with("[alice] active_peer_never_unread"));
    }

    #[test]
    fn empty_registry_accepts_anything() {
        let registry = InvariantRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.check_client(&broken_alice()).is_ok());
    }
}
