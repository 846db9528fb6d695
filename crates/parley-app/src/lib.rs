//! Application layer for Parley
//!
//! Generic runtime that pumps user input and transport events into the
//! [`parley_client::Client`] and executes the actions it returns. The same
//! loop runs in production and in deterministic simulation; only the
//! [`Driver`] differs.
//!
//! # Components
//!
//! - [`Driver`]: Trait for platform-specific I/O abstraction
//! - [`Runtime`]: Generic orchestration loop using Driver
//! - [`UserInput`], [`TransportSignal`]: What a driver reports

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod driver;
mod runtime;

pub use driver::{Driver, TransportSignal, UserInput};
pub use runtime::Runtime;
