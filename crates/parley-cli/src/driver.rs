//! TCP and terminal driver.
//!
//! Two background tasks feed the driver through channels:
//!
//! - the connection task owns the socket, writes outbound packets as JSON
//!   lines, reads inbound lines as packets, and reconnects after a loss
//! - the stdin task parses each line into a [`UserInput`]
//!
//! The driver itself never blocks on either: [`Driver::poll_input`] only
//! takes what is ready, and [`Driver::recv_packet`] waits at most one tick.
//!
//! Outbound packets are dropped while the socket is down. Anything still
//! queued from the old connection is discarded before `Connected` is
//! reported, so the client's `join` is the first line a new socket carries.

use std::{
    io::{self, Write},
    time::Duration,
};

use parley_app::{Driver, TransportSignal, UserInput};
use parley_client::Client;
use parley_core::Environment;
use parley_crypto::CryptoProvider;
use parley_proto::Packet;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
    sync::mpsc,
    task::AbortHandle,
};
use tracing::{debug, info, warn};

use crate::{CliError, input::parse_line, render::LineRenderer};

/// Longest wait for an inbound signal before the runtime ticks.
const TICK: Duration = Duration::from_millis(100);

/// Pause between reconnection attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Channel capacity in both directions.
const CHANNEL_CAPACITY: usize = 64;

/// Driver for the command-line client.
pub struct TcpDriver {
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: mpsc::Receiver<TransportSignal>,
    input: mpsc::Receiver<UserInput>,
    connected: bool,
    renderer: LineRenderer,
    tasks: Vec<AbortHandle>,
}

impl TcpDriver {
    /// Connect to `addr` and start reading stdin.
    ///
    /// # Errors
    ///
    /// - `CliError::Connection` if the first connection attempt fails
    pub async fn connect(addr: &str) -> Result<Self, CliError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| CliError::Connection { addr: addr.to_string(), reason: e.to_string() })?;
        info!("connected to {}", addr);

        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (input_tx, input_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let connection =
            tokio::spawn(run_connection(addr.to_string(), stream, outbound_rx, inbound_tx));
        let stdin = tokio::spawn(read_stdin(input_tx));

        Ok(Self {
            outbound: outbound_tx,
            inbound: inbound_rx,
            input: input_rx,
            connected: true,
            renderer: LineRenderer::new(),
            tasks: vec![connection.abort_handle(), stdin.abort_handle()],
        })
    }
}

impl Driver for TcpDriver {
    type Error = CliError;
    type Instant = std::time::Instant;

    async fn poll_input(&mut self) -> Result<Option<UserInput>, Self::Error> {
        match self.input.try_recv() {
            Ok(input) => Ok(Some(input)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Ok(Some(UserInput::Quit)),
        }
    }

    async fn send_packet(&mut self, packet: Packet) -> Result<(), Self::Error> {
        if !self.connected {
            debug!(event = %packet.event, "not connected, packet dropped");
            return Ok(());
        }
        let bytes = packet.encode()?;
        self.outbound.send(bytes).await.map_err(|_| CliError::TransportClosed)
    }

    async fn recv_packet(&mut self) -> Option<TransportSignal> {
        let signal = tokio::time::timeout(TICK, self.inbound.recv()).await.ok().flatten()?;
        match signal {
            TransportSignal::Connected => self.connected = true,
            TransportSignal::Disconnected => self.connected = false,
            TransportSignal::Packet(_) | TransportSignal::ConnectFailed => {},
        }
        Some(signal)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn render<E, C>(&mut self, client: &Client<E, C>) -> Result<(), Self::Error>
    where
        E: Environment<Instant = Self::Instant>,
        C: CryptoProvider,
    {
        let lines = self.renderer.update(client);
        if lines.is_empty() {
            return Ok(());
        }

        let mut stdout = io::stdout().lock();
        for line in lines {
            writeln!(stdout, "{line}")?;
        }
        stdout.flush()?;
        Ok(())
    }

    fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.connected = false;
    }
}

impl Drop for TcpDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// How a served connection ended.
enum Ended {
    /// Socket closed or failed; try again.
    Lost,
    /// The driver is gone; stop for good.
    Closed,
}

/// Own the socket for the lifetime of the driver, reconnecting after losses.
async fn run_connection(
    addr: String,
    first: TcpStream,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    inbound: mpsc::Sender<TransportSignal>,
) {
    let mut stream = Some(first);

    loop {
        let current = match stream.take() {
            Some(stream) => stream,
            None => match TcpStream::connect(&addr).await {
                Ok(stream) => {
                    info!("reconnected to {}", addr);
                    discard_queued(&mut outbound);
                    if inbound.send(TransportSignal::Connected).await.is_err() {
                        return;
                    }
                    stream
                },
                Err(e) => {
                    warn!("reconnect to {} failed: {}", addr, e);
                    if inbound.send(TransportSignal::ConnectFailed).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(RECONNECT_DELAY).await;
                    continue;
                },
            },
        };

        match serve(current, &mut outbound, &inbound).await {
            Ended::Closed => return,
            Ended::Lost => {
                if inbound.send(TransportSignal::Disconnected).await.is_err() {
                    return;
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
                discard_queued(&mut outbound);
            },
        }
    }
}

/// Drop packets written for a connection that no longer exists.
fn discard_queued(outbound: &mut mpsc::Receiver<Vec<u8>>) {
    let mut dropped = 0usize;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!(dropped, "discarded packets queued before reconnect");
    }
}

/// Shuttle lines between one socket and the driver channels.
async fn serve(
    stream: TcpStream,
    outbound: &mut mpsc::Receiver<Vec<u8>>,
    inbound: &mpsc::Sender<TransportSignal>,
) -> Ended {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => {},
                Ok(Some(line)) => {
                    if inbound.send(TransportSignal::Packet(line.into_bytes())).await.is_err() {
                        return Ended::Closed;
                    }
                },
                Ok(None) => {
                    warn!("server closed the connection");
                    return Ended::Lost;
                },
                Err(e) => {
                    warn!("read failed: {}", e);
                    return Ended::Lost;
                },
            },

            packet = outbound.recv() => {
                let Some(mut bytes) = packet else {
                    return Ended::Closed;
                };
                bytes.push(b'\n');
                if let Err(e) = write.write_all(&bytes).await {
                    warn!("write failed: {}", e);
                    return Ended::Lost;
                }
                debug!(len = bytes.len(), "packet sent");
            },
        }
    }
}

/// Forward parsed stdin lines until EOF, then ask to quit.
async fn read_stdin(input: mpsc::Sender<UserInput>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let parsed = match lines.next_line().await {
            Ok(Some(line)) => match parse_line(&line) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                },
            },
            Ok(None) => UserInput::Quit,
            Err(e) => {
                warn!("stdin read failed: {}", e);
                UserInput::Quit
            },
        };

        let quit = parsed == UserInput::Quit;
        if input.send(parsed).await.is_err() || quit {
            return;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::{io::AsyncBufReadExt, net::TcpListener};

    use super::*;

    #[tokio::test]
    async fn packets_travel_as_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut driver = TcpDriver::connect(&addr).await.unwrap();
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut server_lines = BufReader::new(read).lines();

        driver.send_packet(Packet::new(parley_proto::EventName::Join, None)).await.unwrap();
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), r#"["join"]"#);

        write.write_all(b"[\"connect_error\"]\n").await.unwrap();
        let signal = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(signal) = driver.recv_packet().await {
                    return signal;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(signal, TransportSignal::Packet(br#"["connect_error"]"#.to_vec()));
    }

    #[tokio::test]
    async fn server_hangup_reports_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut driver = TcpDriver::connect(&addr).await.unwrap();
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);

        let signal = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(signal) = driver.recv_packet().await {
                    return signal;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(signal, TransportSignal::Disconnected);
        assert!(!driver.is_connected());
    }

    async fn next_signal(driver: &mut TcpDriver) -> TransportSignal {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(signal) = driver.recv_packet().await {
                    return signal;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn offline_sends_never_block_or_replay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let mut driver = TcpDriver::connect(&addr).await.unwrap();
        let (socket, _) = listener.accept().await.unwrap();
        drop(socket);
        assert_eq!(next_signal(&mut driver).await, TransportSignal::Disconnected);

        let init = Packet::new(parley_proto::EventName::InitChat, None);
        tokio::time::timeout(Duration::from_secs(1), async {
            for _ in 0..CHANNEL_CAPACITY * 3 {
                driver.send_packet(init.clone()).await.unwrap();
            }
        })
        .await
        .unwrap();

        let (socket, _) = listener.accept().await.unwrap();
        loop {
            if next_signal(&mut driver).await == TransportSignal::Connected {
                break;
            }
        }
        assert!(driver.is_connected());

        let mut server_lines = BufReader::new(socket).lines();
        driver.send_packet(Packet::new(parley_proto::EventName::Join, None)).await.unwrap();
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), r#"["join"]"#);
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        assert!(matches!(TcpDriver::connect(&addr).await, Err(CliError::Connection { .. })));
    }
}
