//! Simulation driver implementing the [`Driver`] trait.
//!
//! `SimDriver` provides the same interface as the CLI driver but for
//! deterministic testing, so the same [`parley_app::Runtime`] orchestration
//! code runs in both production and simulation.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use parley_app::{Driver, TransportSignal, UserInput};
use parley_client::Client;
use parley_core::Environment;
use parley_crypto::CryptoProvider;
use parley_proto::{ClientRequest, Packet, PeerId};
use tracing::warn;

use crate::{
    SimEnv, SimServer,
    invariants::{ClientSnapshot, InvariantRegistry},
};

/// Error type for simulation driver.
#[derive(Debug, Clone)]
pub struct SimDriverError(pub String);

impl std::fmt::Display for SimDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimDriverError: {}", self.0)
    }
}

impl std::error::Error for SimDriverError {}

/// Shared state for injection from outside the runtime.
#[derive(Default)]
struct SharedState {
    inputs: VecDeque<UserInput>,
    signals: VecDeque<TransportSignal>,
    outgoing: Vec<Packet>,
    connected: bool,
    renders: usize,
    last_frame: Vec<String>,
}

/// Simulation driver for deterministic testing.
///
/// Clones share injected inputs and captured output, so a test keeps one
/// clone while the runtime owns the other.
#[derive(Clone)]
pub struct SimDriver {
    state: Arc<Mutex<SharedState>>,
    env: SimEnv,
    invariants: Option<Arc<InvariantRegistry>>,
}

impl SimDriver {
    /// Create a driver reading time from `env`.
    pub fn new(env: SimEnv) -> Self {
        Self { state: Arc::new(Mutex::new(SharedState::default())), env, invariants: None }
    }

    /// Check invariants on every render; a violation fails the render.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = Some(Arc::new(registry));
        self
    }

    fn state(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a user input.
    pub fn inject_input(&self, input: UserInput) {
        self.state().inputs.push_back(input);
    }

    /// Queue a transport signal.
    pub fn inject_signal(&self, signal: TransportSignal) {
        let mut state = self.state();
        match signal {
            TransportSignal::Connected => state.connected = true,
            TransportSignal::Disconnected => state.connected = false,
            TransportSignal::Packet(_) | TransportSignal::ConnectFailed => {},
        }
        state.signals.push_back(signal);
    }

    /// Take all captured outgoing packets.
    pub fn take_outgoing(&self) -> Vec<Packet> {
        std::mem::take(&mut self.state().outgoing)
    }

    /// Check if there are inputs or signals left to process.
    pub fn has_pending(&self) -> bool {
        let state = self.state();
        !state.inputs.is_empty() || !state.signals.is_empty()
    }

    /// Number of renders so far.
    pub fn render_count(&self) -> usize {
        self.state().renders
    }

    /// Conversation lines drawn by the last render.
    pub fn last_frame(&self) -> Vec<String> {
        self.state().last_frame.clone()
    }

    /// Advance the virtual clock.
    pub fn advance(&self, by: Duration) {
        self.env.advance(by);
    }

    /// Hand captured packets from `user` to `server` and queue the server's
    /// replies to `user` as incoming packets.
    pub fn exchange_with(&self, server: &mut SimServer, user: &PeerId) {
        for packet in self.take_outgoing() {
            match ClientRequest::from_packet(packet) {
                Ok(request) => server.handle(user, request),
                Err(e) => warn!("client sent an unparseable request: {}", e),
            }
        }

        for event in server.drain_for(user) {
            match event.into_packet().and_then(|packet| packet.encode()) {
                Ok(bytes) => self.inject_signal(TransportSignal::Packet(bytes)),
                Err(e) => warn!("server event failed to encode: {}", e),
            }
        }
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = Duration;

    async fn poll_input(&mut self) -> Result<Option<UserInput>, Self::Error> {
        Ok(self.state().inputs.pop_front())
    }

    async fn send_packet(&mut self, packet: Packet) -> Result<(), Self::Error> {
        self.state().outgoing.push(packet);
        Ok(())
    }

    async fn recv_packet(&mut self) -> Option<TransportSignal> {
        self.state().signals.pop_front()
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn now(&self) -> Duration {
        self.env.now()
    }

    fn render<E, C>(&mut self, client: &Client<E, C>) -> Result<(), Self::Error>
    where
        E: Environment<Instant = Self::Instant>,
        C: CryptoProvider,
    {
        {
            let mut state = self.state();
            state.renders += 1;
            state.last_frame =
                client.conversation().entries().iter().map(|e| e.display_text().to_string()).collect();
        }

        if let Some(registry) = &self.invariants {
            if let Err(violations) = registry.check_client(&ClientSnapshot::from_client(client)) {
                let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
                return Err(SimDriverError(messages.join("; ")));
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state();
        state.connected = false;
        state.signals.clear();
    }
}
