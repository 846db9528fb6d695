//! Parley command-line client.
//!
//! # Usage
//!
//! ```bash
//! # Print this user's public keys, then exit
//! parley --user alice --key-seed "correct horse" --show-keys
//!
//! # Chat with bob, trusting his verifying key
//! parley --server 127.0.0.1:5000 --user alice --key-seed "correct horse" \
//!     --peer-key bob=<base64>
//! ```

use std::{
    io::{self, Write},
    time::Duration,
};

use clap::Parser;
use parley_app::Runtime;
use parley_cli::{
    LocalIdentity, SystemEnv, TcpDriver,
    keys::{PeerKey, parse_peer_key},
};
use parley_client::{Client, ClientConfig};
use parley_proto::PeerId;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parley chat client
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(about = "Secure per-peer chat over a Parley server")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:5000")]
    server: String,

    /// Local user name
    #[arg(short, long)]
    user: String,

    /// Seed the local keys are derived from
    #[arg(long)]
    key_seed: String,

    /// Peer to list in the directory (repeatable)
    #[arg(short, long = "peer")]
    peers: Vec<String>,

    /// Trusted peer verifying key as name=base64 (repeatable)
    #[arg(long = "peer-key", value_parser = parse_peer_key)]
    peer_keys: Vec<PeerKey>,

    /// Fail a key exchange with no reply after this many seconds
    #[arg(long)]
    key_exchange_timeout_secs: Option<u64>,

    /// Drop a message awaiting verification after this many seconds
    #[arg(long)]
    verification_timeout_secs: Option<u64>,

    /// Seal message bodies with the negotiated session key
    #[arg(long)]
    end_to_end: bool,

    /// Print the local public keys and exit
    #[arg(long)]
    show_keys: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn config(&self) -> ClientConfig {
        let mut peers: Vec<PeerId> = self.peers.iter().map(PeerId::new).collect();
        for key in &self.peer_keys {
            if !peers.contains(&key.peer) {
                peers.push(key.peer.clone());
            }
        }

        let mut config =
            ClientConfig::new(self.user.as_str()).with_peers(peers).with_end_to_end(self.end_to_end);
        if let Some(secs) = self.key_exchange_timeout_secs {
            config = config.with_key_exchange_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.verification_timeout_secs {
            config = config.with_verification_timeout(Duration::from_secs(secs));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    // stdout carries the conversation
    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let identity = LocalIdentity::from_seed(PeerId::new(args.user.as_str()), &args.key_seed);

    if args.show_keys {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "user:          {}", identity.user())?;
        writeln!(stdout, "public key:    {}", identity.public_key())?;
        writeln!(stdout, "verifying key: {}", identity.verifying_key())?;
        return Ok(());
    }

    let config = args.config();
    tracing::info!("Parley client starting as {}", identity.user());
    tracing::info!("Connecting to {}", args.server);

    let crypto = identity.provider(args.peer_keys.iter().cloned());
    let client = Client::new(SystemEnv::new(), crypto, config);
    let driver = TcpDriver::connect(&args.server).await?;

    Runtime::new(driver, client).run().await?;

    Ok(())
}
