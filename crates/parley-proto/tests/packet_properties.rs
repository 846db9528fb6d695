//! Property-based tests for the packet codec
//!
//! The server is not ours to change, so decoding must survive any input and
//! whatever the server sends must be echoed back without loss.

#![allow(clippy::unwrap_used)]

use parley_proto::{
    ClientRequest, EventName, Packet, PeerId, ServerEvent,
    payloads::message::{ReceivedMessage, SendMessage, VerifyMessage},
};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

/// Strategy for field names the client does not know about
fn unknown_field() -> impl Strategy<Value = String> {
    "[a-z_]{1,12}".prop_filter("must not shadow a known field", |name| {
        !["sender", "message", "iv", "cipher", "hash", "signature", "request_id"]
            .contains(&name.as_str())
    })
}

/// Strategy for server-side `receive_message` payloads with extra fields
fn arbitrary_received() -> impl Strategy<Value = Value> {
    (
        "[a-z]{1,8}",
        proptest::option::of(".{0,40}"),
        proptest::option::of("[A-Za-z0-9+/=]{0,32}"),
        prop::collection::btree_map(unknown_field(), any::<i64>(), 0..4),
    )
        .prop_map(|(sender, message, cipher, extra)| {
            let mut object = Map::new();
            object.insert("sender".to_string(), json!(sender));
            if let Some(message) = message {
                object.insert("message".to_string(), json!(message));
            }
            if let Some(cipher) = cipher {
                object.insert("cipher".to_string(), json!(cipher));
            }
            for (key, value) in extra {
                object.insert(key, json!(value));
            }
            Value::Object(object)
        })
}

proptest! {
    #[test]
    fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Packet::decode(&bytes);
        let _ = ServerEvent::decode(&bytes);
    }

    #[test]
    fn verify_echoes_every_received_field(
        received in arbitrary_received(),
        request_id in proptest::option::of(any::<u64>()),
    ) {
        let bytes = serde_json::to_vec(&json!(["receive_message", received.clone()])).unwrap();
        let ServerEvent::ReceiveMessage(message) = ServerEvent::decode(&bytes).unwrap() else {
            return Err(TestCaseError::fail("expected receive_message"));
        };

        let packet = ClientRequest::VerifyMessage(VerifyMessage { received: message, request_id })
            .into_packet()
            .unwrap();
        prop_assert_eq!(packet.event, EventName::VerifyMessage);

        let payload = packet.payload.unwrap();
        let Value::Object(echoed) = payload else {
            return Err(TestCaseError::fail("payload must be an object"));
        };
        let Value::Object(original) = received else {
            return Err(TestCaseError::fail("strategy yields objects"));
        };

        for (key, value) in &original {
            prop_assert_eq!(echoed.get(key), Some(value));
        }
        prop_assert_eq!(echoed.get("request_id").and_then(Value::as_u64), request_id);
        let added = usize::from(request_id.is_some());
        prop_assert_eq!(echoed.len(), original.len() + added);
    }

    #[test]
    fn absent_ids_stay_off_the_wire(receiver in "[a-z]{1,8}", message in ".{0,40}") {
        let request = ClientRequest::SendMessage(SendMessage {
            receiver: PeerId::new(receiver.as_str()),
            message: message.clone(),
            message_id: None,
        });
        let payload = request.into_packet().unwrap().payload.unwrap();
        prop_assert_eq!(payload, json!({ "receiver": receiver, "message": message }));
    }
}

#[test]
fn inline_received_message_is_minimal() {
    let received = ReceivedMessage::inline(PeerId::new("bob"), "hey");
    assert_eq!(serde_json::to_value(&received).unwrap(), json!({ "sender": "bob", "message": "hey" }));
}
