//! Generic runtime for client orchestration.
//!
//! The Runtime drives the event loop, coordinating between:
//! - [`Client`]: protocol state machine
//! - [`Driver`]: platform-specific I/O

use parley_client::{Client, ClientAction, ClientEvent};
use parley_core::Environment;
use parley_crypto::CryptoProvider;
use parley_proto::ServerEvent;

use crate::{Driver, TransportSignal, UserInput};

/// Generic runtime that orchestrates Client and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment for time and randomness
/// - `C`: Crypto provider
pub struct Runtime<D, E, C>
where
    D: Driver,
    E: Environment,
    C: CryptoProvider,
{
    driver: D,
    client: Client<E, C>,
}

impl<D, E, C> Runtime<D, E, C>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
    C: CryptoProvider,
{
    /// Create a new runtime with the given driver and client.
    pub fn new(driver: D, client: Client<E, C>) -> Self {
        Self { driver, client }
    }

    /// Run the main event loop until the user quits.
    ///
    /// Each cycle:
    /// 1. Polls the driver for user input
    /// 2. Receives one transport signal
    /// 3. Ticks the client with the driver's clock
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<(), D::Error> {
        self.start().await?;

        loop {
            if self.cycle().await? {
                break;
            }
        }

        self.driver.stop();
        Ok(())
    }

    /// Join the server and draw the initial state.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn start(&mut self) -> Result<(), D::Error> {
        let actions = self.client.start();
        self.execute(actions).await?;
        self.driver.render(&self.client)
    }

    /// Process one cycle of the event loop.
    ///
    /// Returns `true` if the application should quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn cycle(&mut self) -> Result<bool, D::Error> {
        if let Some(input) = self.driver.poll_input().await? {
            let event = match input {
                UserInput::Quit => return Ok(true),
                UserInput::SelectPeer(peer) => ClientEvent::SelectPeer { peer },
                UserInput::Send(text) => ClientEvent::SendMessage { text },
                UserInput::LoadUnread(peer) => ClientEvent::LoadUnreadMessages { peer },
            };
            let actions = self.client.handle(event);
            self.execute(actions).await?;
        }

        if let Some(signal) = self.driver.recv_packet().await
            && let Some(event) = Self::transport_event(signal)
        {
            let actions = self.client.handle(event);
            self.execute(actions).await?;
        }

        let now = self.driver.now();
        let actions = self.client.handle(ClientEvent::Tick { now });
        self.execute(actions).await?;

        Ok(false)
    }

    fn transport_event(signal: TransportSignal) -> Option<ClientEvent<E::Instant>> {
        match signal {
            TransportSignal::Connected => Some(ClientEvent::Connected),
            TransportSignal::Disconnected => Some(ClientEvent::Received(ServerEvent::Disconnect)),
            TransportSignal::ConnectFailed => Some(ClientEvent::Received(ServerEvent::ConnectError)),
            TransportSignal::Packet(bytes) => match ServerEvent::decode(&bytes) {
                Ok(event) => Some(ClientEvent::Received(event)),
                Err(e) => {
                    tracing::warn!("Dropping undecodable packet: {}", e);
                    None
                },
            },
        }
    }

    /// Execute client actions. Renders at most once.
    async fn execute(&mut self, actions: Vec<ClientAction>) -> Result<(), D::Error> {
        let mut render = false;

        for action in actions {
            match action {
                ClientAction::Send(request) => match request.into_packet() {
                    Ok(packet) => self.driver.send_packet(packet).await?,
                    Err(e) => tracing::error!("Failed to encode request: {}", e),
                },
                ClientAction::Notice(notice) => {
                    tracing::debug!(level = ?notice.level, text = %notice.text, "notice");
                    render = true;
                },
                ClientAction::SendEnabled(_)
                | ClientAction::UnreadChanged { .. }
                | ClientAction::Render => render = true,
            }
        }

        if render {
            self.driver.render(&self.client)?;
        }
        Ok(())
    }

    /// Get a reference to the Client
    pub fn client(&self) -> &Client<E, C> {
        &self.client
    }

    /// Get a reference to the Driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get a mutable reference to the Driver
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
