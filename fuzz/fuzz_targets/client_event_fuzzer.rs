//! Fuzz target for the client state machine
//!
//! Feeds arbitrary user intents, server events, and clock ticks to a single
//! client and checks the standard invariants after every step.
//!
//! # Strategy
//!
//! - Peers: a small fixed set, one of them unknown to the directory
//! - Server events: key exchanges (fresh, reuse, rejected), inbound
//!   messages, verification and delivery outcomes with arbitrary ids
//! - Time: ticks advance the virtual clock so timeouts fire
//!
//! # Invariants
//!
//! - The active peer is never marked unread
//! - Sending is enabled only for an established session
//! - At most one session is active and it matches the conversation
//! - Pending verifications belong to the active peer
//! - NEVER panic

#![no_main]

use std::time::Duration;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use parley_client::{Client, ClientConfig, ClientEvent};
use parley_core::Environment;
use parley_harness::{ClientSnapshot, InvariantRegistry, MockCrypto, SimEnv, SystemSnapshot};
use parley_proto::{
    PeerId, ServerEvent,
    payloads::{
        message::{MessageStatus, MessageVerified, ReceivedMessage},
        session::{ChatError, KeyExchange, UnreadMessages},
    },
};

/// Peers the fuzzer picks from. The last one is not in the directory.
const PEERS: [&str; 4] = ["bob", "carol", "dave", "mallory"];

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    Select(u8),
    Send(String),
    LoadUnread(u8),
    Connected,
    Disconnect,
    ConnectError,
    Tick(u8),
    KeyExchange { peer: u8, kind: KeyKind },
    Receive { peer: u8, text: String },
    Verified { peer: u8, success: bool, request_id: Option<u8> },
    Status { peer: u8, delivered: bool, message_id: Option<u8> },
    Unread { peer: u8, count: u8 },
    ChatError(String),
}

#[derive(Debug, Clone, Arbitrary)]
enum KeyKind {
    Fresh,
    Reuse,
    Rejected,
}

fuzz_target!(|input: (u64, Vec<Op>)| {
    let (seed, ops) = input;
    let env = SimEnv::with_seed(seed);
    let config = ClientConfig::new("alice")
        .with_peers(PEERS[..3].iter().copied())
        .with_key_exchange_timeout(Duration::from_secs(5))
        .with_verification_timeout(Duration::from_secs(5));
    let mut client = Client::new(env.clone(), MockCrypto::new(), config);
    let invariants = InvariantRegistry::standard();

    client.start();
    for op in ops {
        client.handle(to_event(op, &env));
        let snapshot = SystemSnapshot::single(ClientSnapshot::from_client(&client));
        invariants.assert_all(&snapshot, "after fuzzed event");
    }
});

fn peer(index: u8) -> PeerId {
    PeerId::new(PEERS[index as usize % PEERS.len()])
}

fn to_event(op: Op, env: &SimEnv) -> ClientEvent<Duration> {
    match op {
        Op::Select(p) => ClientEvent::SelectPeer { peer: peer(p) },
        Op::Send(text) => ClientEvent::SendMessage { text },
        Op::LoadUnread(p) => ClientEvent::LoadUnreadMessages { peer: peer(p) },
        Op::Connected => ClientEvent::Connected,
        Op::Disconnect => ClientEvent::Received(ServerEvent::Disconnect),
        Op::ConnectError => ClientEvent::Received(ServerEvent::ConnectError),
        Op::Tick(secs) => {
            env.advance(Duration::from_secs(u64::from(secs % 8)));
            ClientEvent::Tick { now: env.now() }
        },
        Op::KeyExchange { peer: p, kind } => {
            let exchange = match kind {
                KeyKind::Reuse => KeyExchange::reuse(peer(p)),
                KeyKind::Fresh => KeyExchange {
                    sender: peer(p),
                    encrypted_aes_key: format!("key-{p}"),
                    signature: "sig".to_string(),
                },
                KeyKind::Rejected => KeyExchange {
                    sender: peer(p),
                    encrypted_aes_key: MockCrypto::REJECTED.to_string(),
                    signature: "sig".to_string(),
                },
            };
            ClientEvent::Received(ServerEvent::KeyExchange(exchange))
        },
        Op::Receive { peer: p, text } => {
            ClientEvent::Received(ServerEvent::ReceiveMessage(ReceivedMessage::inline(peer(p), text)))
        },
        Op::Verified { peer: p, success, request_id } => {
            ClientEvent::Received(ServerEvent::MessageVerified(MessageVerified {
                sender: peer(p),
                status: if success { "success" } else { "error" }.to_string(),
                message: Some("verified".to_string()),
                request_id: request_id.map(u64::from),
            }))
        },
        Op::Status { peer: p, delivered, message_id } => {
            ClientEvent::Received(ServerEvent::MessageStatus(MessageStatus {
                receiver: peer(p),
                status: if delivered { "delivered" } else { "failed" }.to_string(),
                message: None,
                error: None,
                message_id: message_id.map(u64::from),
            }))
        },
        Op::Unread { peer: p, count } => {
            let sender = peer(p);
            let messages = (0..count % 4)
                .map(|i| ReceivedMessage::inline(sender.clone(), format!("backlog {i}")))
                .collect();
            ClientEvent::Received(ServerEvent::UnreadMessages(UnreadMessages { sender, messages }))
        },
        Op::ChatError(message) => ClientEvent::Received(ServerEvent::ChatError(ChatError { message })),
    }
}
