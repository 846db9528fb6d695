//! Reply correlation under reordering.
//!
//! Replies that echo `request_id` / `message_id` land on the exact entry they
//! answer, whatever order they arrive in. Without ids the client falls back
//! to the most recent entry, which only works when replies arrive in
//! reverse order of issue or one at a time.

#![allow(clippy::unwrap_used)]

use parley_core::{Delivery, Entry};
use parley_harness::{SimServer, SimWorld};
use parley_proto::{PeerId, ServerEvent};

fn world(server: SimServer) -> SimWorld {
    let mut world = SimWorld::build(&["alice", "bob"], 8, server, |config| config);
    world.connect("alice");
    world.connect("bob");
    world.select("alice", "bob");
    world.deliver_all();
    world.select("bob", "alice");
    world.deliver_all();
    world
}

/// Alice sends `texts`; bob receives them all and asks for verification.
/// Returns the replies the server produced, undelivered.
fn receive_all(world: &mut SimWorld, texts: &[&str]) -> Vec<(PeerId, ServerEvent)> {
    for text in texts {
        world.send("alice", text);
    }
    for (to, event) in world.take_deliveries() {
        world.deliver(&to, event);
    }
    assert_eq!(world.client("bob").unwrap().conversation().pending_count(), texts.len());
    world.take_deliveries()
}

fn received_texts(world: &SimWorld) -> Vec<String> {
    world
        .client("bob")
        .unwrap()
        .conversation()
        .entries()
        .iter()
        .filter(|e| matches!(e, Entry::Received(_)))
        .map(|e| e.display_text().to_string())
        .collect()
}

#[test]
fn ids_survive_reversed_replies() {
    let mut world = world(SimServer::new(8));
    let mut replies = receive_all(&mut world, &["one", "two", "three"]);

    replies.reverse();
    for (to, event) in replies {
        world.deliver(&to, event);
    }

    assert_eq!(received_texts(&world), ["one", "two", "three"]);
    let alice = world.client("alice").unwrap();
    assert!(alice.conversation().sent().all(|m| m.delivery == Some(Delivery::Delivered)));
}

#[test]
fn ids_survive_interleaved_replies() {
    let mut world = world(SimServer::new(8));
    let replies = receive_all(&mut world, &["one", "two", "three", "four"]);

    let (even, odd): (Vec<_>, Vec<_>) =
        replies.into_iter().enumerate().partition(|(i, _)| (i / 2) % 2 == 0);
    for (_, (to, event)) in odd.into_iter().chain(even) {
        world.deliver(&to, event);
    }

    assert_eq!(received_texts(&world), ["one", "two", "three", "four"]);
}

#[test]
fn status_for_older_message_hits_that_message() {
    let mut world = world(SimServer::new(8));
    let replies = receive_all(&mut world, &["first", "second"]);

    // Deliver only the status for "first"
    let first_status = replies
        .into_iter()
        .find(|(_, e)| matches!(e, ServerEvent::MessageStatus(s) if s.message.as_deref() == Some("first")))
        .unwrap();
    world.deliver(&first_status.0, first_status.1);

    let alice = world.client("alice").unwrap();
    let deliveries: Vec<_> =
        alice.conversation().sent().map(|m| (m.plaintext.as_str(), m.delivery)).collect();
    assert_eq!(deliveries, [("first", Some(Delivery::Delivered)), ("second", None)]);
}

#[test]
fn legacy_server_falls_back_to_most_recent() {
    let mut world = world(SimServer::legacy(8));
    let replies = receive_all(&mut world, &["one", "two", "three"]);

    for (to, event) in replies {
        world.deliver(&to, event);
    }

    // In-order replies without ids finalize the newest placeholder first
    assert_eq!(received_texts(&world), ["three", "two", "one"]);
}

#[test]
fn legacy_server_one_at_a_time_is_exact() {
    let mut world = world(SimServer::legacy(8));

    for text in ["one", "two"] {
        world.send("alice", text);
        world.deliver_all();
    }

    assert_eq!(received_texts(&world), ["one", "two"]);
    let alice = world.client("alice").unwrap();
    assert!(alice.conversation().sent().all(|m| m.delivery == Some(Delivery::Delivered)));
}
