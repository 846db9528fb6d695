//! Deterministic simulation harness for Parley client testing.
//!
//! Everything here is in-memory and seeded: a virtual clock, a seeded RNG, a
//! model of the chat server, and drivers that feed the real client and
//! runtime code.
//!
//! # Components
//!
//! - [`SimEnv`]: virtual clock plus seeded `ChaCha8` randomness
//! - [`SimServer`]: Sans-IO model of the chat server (session store, key
//!   exchange, message relay and verification, unread backlog)
//! - [`SimWorld`]: several clients wired to one server, with explicit control
//!   over delivery order
//! - [`SimDriver`]: [`parley_app::Driver`] implementation for runtime tests
//! - [`MockCrypto`]: counting crypto provider for tests that do not need
//!   real key material
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold after every step
//! of any event sequence. Use [`InvariantRegistry::standard()`] for the
//! client invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod identity;
pub mod invariants;
pub mod mock_crypto;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;
pub mod world;

pub use identity::SimIdentity;
pub use invariants::{
    ActivePeerNeverUnread, ClientSnapshot, Invariant, InvariantRegistry, InvariantResult,
    PendingOnlyForActivePeer, SendImpliesEstablished, SingleActiveSession, SystemSnapshot,
    Violation,
};
pub use mock_crypto::MockCrypto;
pub use sim_driver::{SimDriver, SimDriverError};
pub use sim_env::SimEnv;
pub use sim_server::SimServer;
pub use world::SimWorld;
