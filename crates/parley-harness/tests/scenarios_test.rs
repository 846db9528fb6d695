//! End-to-end scenarios through the simulated server.
//!
//! Every client here runs real key unwrapping and signature checks against
//! key material issued by [`SimServer`].

#![allow(clippy::unwrap_used)]

use parley_client::{NoticeLevel, SessionState};
use parley_core::{Delivery, Entry, Verification};
use parley_harness::{SimServer, SimWorld, sim_server::USER_NOT_FOUND};
use parley_proto::ClientRequest;

fn established_pair() -> SimWorld {
    let mut world = SimWorld::new(&["alice", "bob", "carol"], 11);
    for user in ["alice", "bob", "carol"] {
        world.connect(user);
    }
    world.select("alice", "bob");
    world.deliver_all();
    world.select("bob", "alice");
    world.deliver_all();
    world
}

fn sent_messages(world: &SimWorld, user: &str) -> usize {
    world.requests(user).iter().filter(|r| matches!(r, ClientRequest::SendMessage(_))).count()
}

fn texts(world: &SimWorld, user: &str) -> Vec<String> {
    world
        .client(user)
        .unwrap()
        .conversation()
        .entries()
        .iter()
        .filter(|e| !matches!(e, Entry::Notice { .. }))
        .map(|e| e.display_text().to_string())
        .collect()
}

#[test]
fn fresh_session_then_reuse() {
    let mut world = SimWorld::new(&["alice", "bob"], 1);
    world.connect("alice");
    world.connect("bob");

    world.select("alice", "bob");
    world.deliver_all();
    let alice = world.client("alice").unwrap();
    assert!(alice.can_send());
    assert!(alice.sessions().active_key().is_some());
    assert!(world.server().has_session(&"alice".into(), &"bob".into()));

    // bob was not looking at alice when the key arrived
    assert_eq!(world.client("bob").unwrap().session_state(&"alice".into()), None);

    world.select("bob", "alice");
    world.deliver_all();
    let bob = world.client("bob").unwrap();
    assert!(bob.can_send());
    assert!(bob.sessions().active_key().is_none(), "reuse path carries no key");
    assert!(
        world
            .notices("bob")
            .iter()
            .any(|n| n.text == "Secure connection established with alice")
    );
}

#[test]
fn message_is_verified_and_delivered() {
    let mut world = established_pair();

    world.send("alice", "hi bob");
    world.deliver_all();

    assert_eq!(texts(&world, "bob"), ["hi bob"]);
    let bob = world.client("bob").unwrap();
    assert!(matches!(
        bob.conversation().entries().last(),
        Some(Entry::Received(m)) if m.verification == Verification::Verified
    ));

    let alice = world.client("alice").unwrap();
    let sent: Vec<_> = alice.conversation().sent().collect();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].delivery, Some(Delivery::Delivered));
    world.check_invariants().unwrap();
}

#[test]
fn message_from_other_peer_marks_unread() {
    let mut world = established_pair();
    world.select("carol", "alice");
    world.deliver_all();

    world.send("carol", "hey alice");
    world.deliver_all();

    let alice = world.client("alice").unwrap();
    assert!(alice.is_unread(&"carol".into()));
    assert_eq!(alice.unread().unseen_count(&"carol".into()), 1);
    assert!(texts(&world, "alice").is_empty());
    world.check_invariants().unwrap();

    world.select("alice", "carol");
    world.deliver_all();
    assert!(!world.client("alice").unwrap().is_unread(&"carol".into()));
}

#[test]
fn tampered_message_is_discarded() {
    let mut world = established_pair();
    world.server_mut().corrupt_next_message();

    world.send("alice", "hi bob");
    world.deliver_all();

    let bob = world.client("bob").unwrap();
    assert_eq!(bob.conversation().pending_count(), 0);
    assert!(texts(&world, "bob").is_empty());
    assert!(
        world
            .notices("bob")
            .iter()
            .any(|n| n.level == NoticeLevel::Error && n.text == "Message verification failed")
    );

    let alice = world.client("alice").unwrap();
    assert_eq!(alice.conversation().sent().last().unwrap().delivery, Some(Delivery::Failed));
}

#[test]
fn blank_messages_never_leave() {
    let mut world = established_pair();

    world.send("alice", "");
    world.send("alice", "   ");
    world.send("alice", "\t\n");

    assert_eq!(sent_messages(&world, "alice"), 0);
    assert!(world.client("alice").unwrap().conversation().sent().next().is_none());
}

#[test]
fn unknown_peer_reported_by_server() {
    let mut world = SimWorld::new(&["alice", "bob"], 3);
    world.connect("alice");

    world.select("alice", "mallory");
    world.deliver_all();

    let alice = world.client("alice").unwrap();
    assert!(!alice.can_send());
    assert_eq!(alice.session_state(&"mallory".into()), Some(SessionState::Requesting));
    assert!(world.notices("alice").iter().any(|n| n.text == USER_NOT_FOUND));
}

#[test]
fn send_before_established_is_refused_locally() {
    let mut world = SimWorld::new(&["alice", "bob"], 4);
    world.connect("alice");
    world.connect("bob");

    world.select("alice", "bob");
    world.send("alice", "too early");

    assert_eq!(sent_messages(&world, "alice"), 0);
    assert!(
        world
            .notices("alice")
            .iter()
            .any(|n| n.text == "Secure connection not established yet. Please wait.")
    );
}

#[test]
fn stale_key_exchange_after_switching_peer() {
    let mut world = SimWorld::new(&["alice", "bob", "carol"], 5);
    for user in ["alice", "bob", "carol"] {
        world.connect(user);
    }

    world.select("alice", "bob");
    let held = world.take_deliveries();

    world.select("alice", "carol");
    for (to, event) in held {
        world.deliver(&to, event);
    }
    let alice = world.client("alice").unwrap();
    assert!(!alice.can_send());
    assert_eq!(alice.session_state(&"bob".into()), Some(SessionState::Requesting));

    world.deliver_all();
    let alice = world.client("alice").unwrap();
    assert!(alice.can_send());
    assert_eq!(alice.active_peer().map(|p| p.as_str()), Some("carol"));
    world.check_invariants().unwrap();
}

#[test]
fn end_to_end_bodies_round_trip() {
    let mut world = SimWorld::build(&["alice", "bob"], 21, SimServer::new(21), |config| {
        config.with_end_to_end(true)
    });
    world.connect("alice");
    world.connect("bob");

    world.select("bob", "alice");
    world.deliver_all();
    // Rekey so both sides hold the same fresh session key
    world.server_mut().forget_session(&"alice".into(), &"bob".into());
    world.select("alice", "bob");
    world.deliver_all();
    assert!(world.client("bob").unwrap().sessions().active_key().is_some());

    world.send("alice", "sealed hello");
    let on_wire = world.requests("alice").iter().find_map(|r| match r {
        ClientRequest::SendMessage(send) => Some(send.message.clone()),
        _ => None,
    });
    assert!(on_wire.is_some_and(|body| body != "sealed hello"));

    world.deliver_all();
    assert_eq!(texts(&world, "bob"), ["sealed hello"]);
    assert_eq!(
        world.client("alice").unwrap().conversation().sent().last().unwrap().delivery,
        Some(Delivery::Delivered)
    );
}

#[test]
fn end_to_end_survives_reuse_on_second_select() {
    let mut world = SimWorld::build(&["alice", "bob"], 23, SimServer::new(23), |config| {
        config.with_end_to_end(true)
    });
    world.connect("alice");
    world.connect("bob");

    world.select("alice", "bob");
    world.deliver_all();
    world.select("bob", "alice");
    world.deliver_all();

    assert!(world.requests("bob").iter().any(|r| matches!(
        r,
        ClientRequest::InitChat(init) if init.receiver == "alice" && init.fresh_key
    )));
    let alice_key = world.client("alice").unwrap().sessions().active_key().map(|k| *k.as_bytes());
    let bob_key = world.client("bob").unwrap().sessions().active_key().map(|k| *k.as_bytes());
    assert!(alice_key.is_some());
    assert_eq!(alice_key, bob_key);

    world.send("alice", "hello bob");
    world.deliver_all();
    world.send("bob", "hi alice");
    world.deliver_all();

    let bob_bodies: Vec<_> = world
        .requests("bob")
        .iter()
        .filter_map(|r| match r {
            ClientRequest::SendMessage(send) => Some(send.message.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(bob_bodies.len(), 1);
    assert_ne!(bob_bodies[0], "hi alice");

    assert_eq!(texts(&world, "bob"), ["hello bob", "hi alice"]);
    assert_eq!(texts(&world, "alice"), ["hello bob", "hi alice"]);
    for user in ["alice", "bob"] {
        assert!(!world.notices(user).iter().any(|n| n.level == NoticeLevel::Error));
    }
    world.check_invariants().unwrap();
}

#[test]
fn config_peers_form_directory() {
    let world = SimWorld::build(&["alice", "bob", "carol"], 2, SimServer::new(2), |mut config| {
        config.peers.push("dave".into());
        config
    });
    let alice = world.client("alice").unwrap();

    assert!(alice.directory().contains(&"bob".into()));
    assert!(alice.directory().contains(&"dave".into()));
    assert_eq!(alice.config().local_user, "alice");
}
