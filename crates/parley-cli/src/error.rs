//! CLI errors.

use std::io;

use thiserror::Error;

/// Errors from the CLI driver.
#[derive(Debug, Error)]
pub enum CliError {
    /// Terminal or socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Could not reach the server.
    #[error("connection to {addr} failed: {reason}")]
    Connection {
        /// Server address.
        addr: String,
        /// Underlying failure.
        reason: String,
    },

    /// The connection task is gone.
    #[error("transport closed")]
    TransportClosed,

    /// A packet could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] parley_proto::ProtocolError),
}
