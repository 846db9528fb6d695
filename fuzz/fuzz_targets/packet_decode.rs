//! Fuzz target for Packet::decode and ServerEvent::from_packet
//!
//! Everything the server sends passes through this path before the client
//! sees it.
//!
//! # Invariants
//!
//! - NEVER panic on malformed JSON or unknown events
//! - A decoded packet re-encodes to bytes that decode to the same packet
//! - A decoded server event converts back to a packet with the same event

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_proto::{Packet, ServerEvent};

fuzz_target!(|data: &[u8]| {
    let Ok(packet) = Packet::decode(data) else {
        return;
    };

    let bytes = packet.encode().expect("decoded packet must re-encode");
    let again = Packet::decode(&bytes).expect("re-encoded packet must decode");
    assert_eq!(again, packet);

    if let Ok(event) = ServerEvent::from_packet(packet.clone()) {
        let back = event.into_packet().expect("server event must encode");
        assert_eq!(back.event, packet.event);
    }
});
