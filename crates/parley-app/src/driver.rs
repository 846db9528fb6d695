//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::future::Future;

use parley_client::Client;
use parley_core::{Environment, Timestamp};
use parley_crypto::CryptoProvider;
use parley_proto::{Packet, PeerId};

/// A user intent read by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserInput {
    /// Open the conversation with a peer
    SelectPeer(PeerId),
    /// Send text to the active peer
    Send(String),
    /// Ask for a peer's unread backlog
    LoadUnread(PeerId),
    /// Leave the application
    Quit,
}

/// Something the transport delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSignal {
    /// An encoded server packet
    Packet(Vec<u8>),
    /// Connection (re)established
    Connected,
    /// Connection lost
    Disconnected,
    /// A connection attempt failed
    ConnectFailed,
}

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in the CLI and in simulation.
///
/// # Implementations
///
/// - **CLI**: stdin lines for input, newline-delimited JSON over TCP
/// - **Simulation**: scripted input and an in-memory server
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Timestamp;

    /// Poll for the next user input.
    ///
    /// Returns `None` if no input is ready.
    fn poll_input(&mut self) -> impl Future<Output = Result<Option<UserInput>, Self::Error>> + Send;

    /// Send a packet to the server.
    ///
    /// While disconnected, packets may be dropped. The client re-requests its
    /// session after `Connected`, so nothing written offline is needed later.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails in a way the runtime cannot
    /// recover from.
    fn send_packet(&mut self, packet: Packet) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Receive the next transport signal.
    ///
    /// Returns `None` if nothing is ready.
    fn recv_packet(&mut self) -> impl Future<Output = Option<TransportSignal>> + Send;

    /// Check if connected to the server.
    fn is_connected(&self) -> bool;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the client state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render<E, C>(&mut self, client: &Client<E, C>) -> Result<(), Self::Error>
    where
        E: Environment<Instant = Self::Instant>,
        C: CryptoProvider;

    /// Stop the connection and clean up resources.
    fn stop(&mut self);
}
