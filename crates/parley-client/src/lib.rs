//! Client
//!
//! Action-based client state machine for the Parley chat protocol. Ties the
//! core state machines together behind one event/action interface.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO pattern as [`parley_core`]. It
//! receives events ([`ClientEvent`]), processes them through pure state
//! machine logic, and returns actions ([`ClientAction`]) for the caller to
//! execute. Failures never escape [`Client::handle`]: user-visible ones turn
//! into conversation notices, stale replies are logged and dropped.
//!
//! # Components
//!
//! - [`Client`]: Top-level state machine
//! - [`ClientConfig`]: Local identity, known peers, timeouts
//! - [`ClientEvent`]: Events fed into the client
//! - [`ClientAction`]: Actions produced by the client

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod client;
mod config;
mod event;

pub use client::Client;
pub use config::ClientConfig;
pub use event::{ClientAction, ClientEvent, Notice};
pub use parley_core::{Environment, NoticeLevel, SessionState};
