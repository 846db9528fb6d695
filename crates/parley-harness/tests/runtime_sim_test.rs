//! Two runtimes talking through the simulated server.
//!
//! Each user runs the production [`Runtime`] loop over a [`SimDriver`]; the
//! test shuttles packets between the drivers and one [`SimServer`].

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use parley_app::{Runtime, TransportSignal, UserInput};
use parley_client::{Client, ClientConfig};
use parley_crypto::SealedKeyProvider;
use parley_harness::{InvariantRegistry, SimDriver, SimEnv, SimIdentity, SimServer};
use parley_proto::PeerId;

type SimRuntime = Runtime<SimDriver, SimEnv, SealedKeyProvider>;

struct Peer {
    id: PeerId,
    driver: SimDriver,
    runtime: SimRuntime,
}

fn setup(env: &SimEnv) -> (SimServer, Peer, Peer) {
    let alice = SimIdentity::from_seed("alice", 100);
    let bob = SimIdentity::from_seed("bob", 200);

    let make = |me: &SimIdentity, other: &SimIdentity, seed: u64| {
        let driver = SimDriver::new(env.clone()).with_invariants(InvariantRegistry::standard());
        let config = ClientConfig::new(me.id().clone()).with_peers([other.id().clone()]);
        let client = Client::new(env.fork(seed), me.provider([other]), config);
        Peer { id: me.id().clone(), driver: driver.clone(), runtime: Runtime::new(driver, client) }
    };
    let alice_peer = make(&alice, &bob, 1);
    let bob_peer = make(&bob, &alice, 2);

    let mut server = SimServer::new(3);
    server.register(alice);
    server.register(bob);
    (server, alice_peer, bob_peer)
}

/// Shuttle packets and run cycles until both sides are quiet.
async fn settle(server: &mut SimServer, peers: &mut [&mut Peer]) {
    for _ in 0..50 {
        for peer in peers.iter_mut() {
            peer.driver.exchange_with(server, &peer.id);
            while peer.driver.has_pending() {
                peer.runtime.cycle().await.unwrap();
            }
            peer.driver.exchange_with(server, &peer.id);
        }
        if !server.has_pending() {
            return;
        }
    }
}

#[tokio::test]
async fn runtimes_exchange_a_verified_message() {
    let env = SimEnv::with_seed(42);
    let (mut server, mut alice, mut bob) = setup(&env);

    alice.runtime.start().await.unwrap();
    bob.runtime.start().await.unwrap();
    settle(&mut server, &mut [&mut alice, &mut bob]).await;
    assert!(server.is_online(&"alice".into()));
    assert!(server.is_online(&"bob".into()));

    alice.driver.inject_input(UserInput::SelectPeer("bob".into()));
    bob.driver.inject_input(UserInput::SelectPeer("alice".into()));
    settle(&mut server, &mut [&mut alice, &mut bob]).await;
    assert!(alice.runtime.client().can_send());
    assert!(bob.runtime.client().can_send());

    alice.driver.inject_input(UserInput::Send("hello from the runtime".into()));
    settle(&mut server, &mut [&mut alice, &mut bob]).await;

    assert!(bob.driver.last_frame().iter().any(|line| line == "hello from the runtime"));
    let sent = alice.runtime.client().conversation().sent().last().cloned().unwrap();
    assert_eq!(sent.delivery, Some(parley_core::Delivery::Delivered));
}

#[tokio::test]
async fn runtime_survives_disconnect() {
    let env = SimEnv::with_seed(43);
    let (mut server, mut alice, mut bob) = setup(&env);

    alice.runtime.start().await.unwrap();
    bob.runtime.start().await.unwrap();
    alice.driver.inject_input(UserInput::SelectPeer("bob".into()));
    settle(&mut server, &mut [&mut alice, &mut bob]).await;
    assert!(alice.runtime.client().can_send());

    server.disconnect(&alice.id);
    alice.driver.inject_signal(TransportSignal::Disconnected);
    settle(&mut server, &mut [&mut alice, &mut bob]).await;
    assert!(!alice.runtime.client().can_send());
    assert!(
        alice
            .driver
            .last_frame()
            .iter()
            .any(|line| line == "Disconnected from server. Trying to reconnect...")
    );

    alice.driver.inject_signal(TransportSignal::Connected);
    settle(&mut server, &mut [&mut alice, &mut bob]).await;
    assert!(alice.runtime.client().can_send());
}

#[tokio::test]
async fn ticks_follow_the_virtual_clock() {
    let env = SimEnv::with_seed(44);
    let alice = SimIdentity::from_seed("alice", 1);
    let driver = SimDriver::new(env.clone());
    let config = ClientConfig::new("alice").with_key_exchange_timeout(Duration::from_secs(5));
    let client = Client::new(env.clone(), alice.provider([]), config);
    let mut runtime = Runtime::new(driver.clone(), client);

    runtime.start().await.unwrap();
    driver.inject_input(UserInput::SelectPeer("bob".into()));
    runtime.cycle().await.unwrap();

    env.advance(Duration::from_secs(6));
    runtime.cycle().await.unwrap();

    assert!(!runtime.client().can_send());
    assert!(driver.last_frame().iter().any(|line| line == "Error establishing secure connection"));
}
