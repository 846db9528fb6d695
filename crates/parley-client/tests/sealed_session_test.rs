//! End-to-end session establishment with real key wrapping.

#![allow(clippy::unwrap_used)]

use ed25519_dalek::SigningKey;
use parley_client::{Client, ClientAction, ClientConfig, ClientEvent, SessionState};
use parley_core::env::test_utils::MockEnv;
use parley_crypto::{
    CryptoProvider, NONCE_SIZE, SESSION_KEY_SIZE, SealedKeyProvider, SessionKey, seal_session_key,
    sign_session,
};
use parley_proto::{
    ClientRequest, PeerId, ServerEvent,
    payloads::{
        message::{MessageVerified, ReceivedMessage},
        session::KeyExchange,
    },
};

struct Fixture {
    alice: PeerId,
    bob: PeerId,
    bob_signing: SigningKey,
    alice_provider: SealedKeyProvider,
}

fn fixture() -> Fixture {
    let alice = PeerId::new("alice");
    let bob = PeerId::new("bob");
    let alice_signing = SigningKey::from_bytes(&[11; 32]);
    let bob_signing = SigningKey::from_bytes(&[22; 32]);

    let mut alice_provider =
        SealedKeyProvider::new(alice.clone(), [1; 32], alice_signing.verifying_key());
    alice_provider.add_peer(bob.clone(), bob_signing.verifying_key());

    Fixture { alice, bob, bob_signing, alice_provider }
}

fn key_exchange(fixture: &Fixture, key: &SessionKey) -> ServerEvent {
    let wrapped = seal_session_key(
        &fixture.alice_provider.public_key(),
        key,
        [3; 32],
        [4; NONCE_SIZE],
    )
    .unwrap();
    let signature = sign_session(&fixture.bob_signing, &fixture.bob, &fixture.alice);
    ServerEvent::KeyExchange(KeyExchange {
        sender: fixture.bob.clone(),
        encrypted_aes_key: wrapped,
        signature,
    })
}

#[test]
fn wrapped_key_establishes_session() {
    let fixture = fixture();
    let session_key = SessionKey::from_bytes([0x33; SESSION_KEY_SIZE]);
    let exchange = key_exchange(&fixture, &session_key);
    let config = ClientConfig::new(fixture.alice.clone()).with_peers([fixture.bob.clone()]);
    let mut client = Client::new(MockEnv::new(), fixture.alice_provider, config);

    client.handle(ClientEvent::SelectPeer { peer: fixture.bob.clone() });
    let actions = client.handle(ClientEvent::Received(exchange));

    assert!(actions.contains(&ClientAction::SendEnabled(true)));
    assert_eq!(client.session_state(&fixture.bob), Some(SessionState::Established));
    assert_eq!(client.sessions().active_key(), Some(&session_key));
}

#[test]
fn tampered_key_fails_session() {
    let fixture = fixture();
    let session_key = SessionKey::from_bytes([0x33; SESSION_KEY_SIZE]);
    let ServerEvent::KeyExchange(mut exchange) = key_exchange(&fixture, &session_key) else {
        unreachable!("fixture builds a key exchange");
    };
    exchange.signature = sign_session(&fixture.bob_signing, &fixture.bob, &PeerId::new("carol"));
    let mut client =
        Client::new(MockEnv::new(), fixture.alice_provider, ClientConfig::new(fixture.alice));

    client.handle(ClientEvent::SelectPeer { peer: fixture.bob.clone() });
    client.handle(ClientEvent::Received(ServerEvent::KeyExchange(exchange)));

    assert_eq!(client.session_state(&fixture.bob), Some(SessionState::Failed));
    assert!(!client.can_send());
}

#[test]
fn sealed_bodies_round_trip_between_peers() {
    let fixture = fixture();
    let session_key = SessionKey::from_bytes([0x33; SESSION_KEY_SIZE]);
    let exchange = key_exchange(&fixture, &session_key);
    let config = ClientConfig::new(fixture.alice.clone())
        .with_peers([fixture.bob.clone()])
        .with_end_to_end(true);
    let mut client = Client::new(MockEnv::new(), fixture.alice_provider, config);
    client.handle(ClientEvent::SelectPeer { peer: fixture.bob.clone() });
    client.handle(ClientEvent::Received(exchange));

    // bob seals a reply with the shared key
    let bob_provider = SealedKeyProvider::new(
        fixture.bob.clone(),
        [2; 32],
        fixture.bob_signing.verifying_key(),
    );
    let sealed = bob_provider.encrypt(&session_key, b"hello alice", [8; NONCE_SIZE]).unwrap();
    let body = base64_encode(&sealed);

    let actions = client.handle(ClientEvent::Received(ServerEvent::ReceiveMessage(
        ReceivedMessage::inline(fixture.bob.clone(), body.clone()),
    )));
    let request_id = actions.iter().find_map(|a| match a {
        ClientAction::Send(ClientRequest::VerifyMessage(verify)) => verify.request_id,
        _ => None,
    });
    client.handle(ClientEvent::Received(ServerEvent::MessageVerified(MessageVerified {
        sender: fixture.bob.clone(),
        status: "success".into(),
        message: Some(body),
        request_id,
    })));

    let last = client.conversation().entries().last().unwrap();
    assert_eq!(last.display_text(), "hello alice");

    // alice's outbound body opens under bob's view of the key
    let actions = client.handle(ClientEvent::SendMessage { text: "hi bob".into() });
    let body = actions
        .iter()
        .find_map(|a| match a {
            ClientAction::Send(ClientRequest::SendMessage(send)) => Some(send.message.clone()),
            _ => None,
        })
        .unwrap();
    let opened = bob_provider.decrypt(&session_key, &base64_decode(&body)).unwrap();
    assert_eq!(opened, b"hi bob");
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    STANDARD.encode(bytes)
}

fn base64_decode(text: &str) -> Vec<u8> {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    STANDARD.decode(text).unwrap()
}
