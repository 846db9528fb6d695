//! In-memory model of the chat server.
//!
//! The server is Sans-IO: [`SimServer::handle`] takes a request from a user
//! and queues the resulting events in an outbox, which the caller drains and
//! delivers in whatever order the test wants.
//!
//! # Behaviour
//!
//! - `init_chat` to an unregistered user answers `chat_error` "User not
//!   found". An existing session answers the reuse sentinel unless the
//!   request asks for a fresh key. Otherwise the server generates a session key, wraps it for both parties, signs
//!   `"{initiator}:{responder}"` as the initiator and sends each party its
//!   copy.
//! - `send_message` without a session answers `chat_error` "Session not
//!   established". Otherwise the body is sealed under the session key, hashed
//!   and signed as the sender, then relayed. Messages to offline users go to
//!   their unread backlog.
//! - `verify_message` checks hash, signature and seal, then answers
//!   `message_verified` to the verifier and `message_status` to the sender.
//! - `load_unread_messages` drains the backlog for that sender.
//!
//! With [`SimServer::legacy`] the server never echoes correlation ids, like
//! a deployment that predates them.

use std::collections::{BTreeSet, HashMap, VecDeque};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use ed25519_dalek::{Signature, Signer, Verifier};
use parley_crypto::{
    NONCE_SIZE, SESSION_KEY_SIZE, SessionKey, open_message, seal_message, seal_session_key,
    sign_session,
};
use parley_proto::{
    ClientRequest, PeerId, ServerEvent,
    payloads::{
        message::{
            MessageStatus, MessageVerified, ReceivedMessage, STATUS_DELIVERED, STATUS_SUCCESS,
            SendMessage, VerifyMessage,
        },
        session::{ChatError, InitChat, KeyExchange, UnreadMessages},
    },
};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::SimIdentity;

/// Error text for `init_chat` to an unregistered user.
pub const USER_NOT_FOUND: &str = "User not found";

/// Error text for `send_message` or `verify_message` without a session.
pub const SESSION_NOT_ESTABLISHED: &str = "Session not established";

/// `message_verified` text on failure.
pub const VERIFICATION_FAILED: &str = "Message verification failed";

type Pair = (PeerId, PeerId);

fn pair(a: &PeerId, b: &PeerId) -> Pair {
    if a <= b { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) }
}

/// Sans-IO chat server.
pub struct SimServer {
    users: HashMap<PeerId, SimIdentity>,
    sessions: HashMap<Pair, SessionKey>,
    online: BTreeSet<PeerId>,
    /// Undelivered messages keyed by (receiver, sender).
    backlog: HashMap<Pair, Vec<ReceivedMessage>>,
    outbox: VecDeque<(PeerId, ServerEvent)>,
    rng: ChaCha8Rng,
    echo_ids: bool,
    corrupt_next: bool,
}

impl SimServer {
    /// Server that echoes correlation ids.
    pub fn new(seed: u64) -> Self {
        Self {
            users: HashMap::new(),
            sessions: HashMap::new(),
            online: BTreeSet::new(),
            backlog: HashMap::new(),
            outbox: VecDeque::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            echo_ids: true,
            corrupt_next: false,
        }
    }

    /// Server that drops correlation ids from its replies.
    pub fn legacy(seed: u64) -> Self {
        Self { echo_ids: false, ..Self::new(seed) }
    }

    /// Register a user's key material.
    pub fn register(&mut self, identity: SimIdentity) {
        self.users.insert(identity.id().clone(), identity);
    }

    /// Mark a user offline. Events for them are dropped or backlogged until
    /// they join again.
    pub fn disconnect(&mut self, user: &PeerId) {
        self.online.remove(user);
    }

    /// Whether `user` has joined and not disconnected.
    pub fn is_online(&self, user: &PeerId) -> bool {
        self.online.contains(user)
    }

    /// Whether the server holds a session between `a` and `b`.
    pub fn has_session(&self, a: &PeerId, b: &PeerId) -> bool {
        self.sessions.contains_key(&pair(a, b))
    }

    /// Drop the session between `a` and `b`, so the next `init_chat` issues a
    /// fresh key.
    pub fn forget_session(&mut self, a: &PeerId, b: &PeerId) {
        self.sessions.remove(&pair(a, b));
    }

    /// Tamper with the hash of the next relayed message so its verification
    /// fails.
    pub fn corrupt_next_message(&mut self) {
        self.corrupt_next = true;
    }

    /// Number of backlogged messages from `sender` to `receiver`.
    pub fn backlog_len(&self, receiver: &PeerId, sender: &PeerId) -> usize {
        self.backlog
            .get(&(receiver.clone(), sender.clone()))
            .map_or(0, Vec::len)
    }

    /// Take every queued event, in emission order.
    pub fn drain(&mut self) -> Vec<(PeerId, ServerEvent)> {
        self.outbox.drain(..).collect()
    }

    /// Take queued events addressed to `user`, leaving the rest.
    pub fn drain_for(&mut self, user: &PeerId) -> Vec<ServerEvent> {
        let (mine, rest): (VecDeque<_>, VecDeque<_>) =
            self.outbox.drain(..).partition(|(to, _)| to == user);
        self.outbox = rest;
        mine.into_iter().map(|(_, event)| event).collect()
    }

    /// Whether any event is waiting for delivery.
    pub fn has_pending(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Process a request from `from`.
    pub fn handle(&mut self, from: &PeerId, request: ClientRequest) {
        trace!(user = %from, event = %request.event(), "server request");
        match request {
            ClientRequest::Join => {
                self.online.insert(from.clone());
            },
            ClientRequest::InitChat(init) => self.init_chat(from, &init),
            ClientRequest::SendMessage(send) => self.send_message(from, send),
            ClientRequest::VerifyMessage(verify) => self.verify_message(from, verify),
            ClientRequest::LoadUnreadMessages(load) => {
                let messages =
                    self.backlog.remove(&(from.clone(), load.sender.clone())).unwrap_or_default();
                self.emit(
                    from,
                    ServerEvent::UnreadMessages(UnreadMessages { sender: load.sender, messages }),
                );
            },
        }
    }

    fn init_chat(&mut self, from: &PeerId, init: &InitChat) {
        let receiver = &init.receiver;
        let (Some(initiator), Some(responder)) = (self.users.get(from), self.users.get(receiver))
        else {
            self.chat_error(from, USER_NOT_FOUND);
            return;
        };

        if !init.fresh_key && self.sessions.contains_key(&pair(from, receiver)) {
            debug!(initiator = %from, responder = %receiver, "session reused");
            self.emit(from, ServerEvent::KeyExchange(KeyExchange::reuse(receiver.clone())));
            return;
        }

        let initiator_key = initiator.public_key();
        let responder_key = responder.public_key();
        let signature = sign_session(initiator.signing_key(), from, receiver);

        let mut key_bytes = [0u8; SESSION_KEY_SIZE];
        self.rng.fill_bytes(&mut key_bytes);
        let session_key = SessionKey::from_bytes(key_bytes);

        let wrapped_for_initiator = self.wrap(&initiator_key, &session_key);
        let wrapped_for_responder = self.wrap(&responder_key, &session_key);
        let (Some(for_initiator), Some(for_responder)) =
            (wrapped_for_initiator, wrapped_for_responder)
        else {
            self.chat_error(from, "Error establishing secure connection");
            return;
        };

        debug!(initiator = %from, responder = %receiver, "session created");
        self.sessions.insert(pair(from, receiver), session_key);

        self.emit(
            from,
            ServerEvent::KeyExchange(KeyExchange {
                sender: receiver.clone(),
                encrypted_aes_key: for_initiator,
                signature: signature.clone(),
            }),
        );
        self.emit(
            receiver,
            ServerEvent::KeyExchange(KeyExchange {
                sender: from.clone(),
                encrypted_aes_key: for_responder,
                signature,
            }),
        );
    }

    fn wrap(&mut self, recipient: &x25519_dalek::PublicKey, key: &SessionKey) -> Option<String> {
        let mut ephemeral = [0u8; 32];
        let mut nonce = [0u8; NONCE_SIZE];
        self.rng.fill_bytes(&mut ephemeral);
        self.rng.fill_bytes(&mut nonce);
        seal_session_key(recipient, key, ephemeral, nonce).ok()
    }

    fn send_message(&mut self, from: &PeerId, send: SendMessage) {
        let Some(key) = self.sessions.get(&pair(from, &send.receiver)) else {
            self.chat_error(from, SESSION_NOT_ESTABLISHED);
            return;
        };
        let Some(sender) = self.users.get(from) else {
            self.chat_error(from, USER_NOT_FOUND);
            return;
        };

        let mut nonce = [0u8; NONCE_SIZE];
        self.rng.fill_bytes(&mut nonce);
        let Ok(sealed) = seal_message(key, send.message.as_bytes(), nonce) else {
            self.chat_error(from, "Failed to send message");
            return;
        };

        let cipher = STANDARD.encode(&sealed);
        let mut hash = digest(&cipher);
        let signature = STANDARD.encode(sender.signing_key().sign(hash.as_bytes()).to_bytes());
        if std::mem::take(&mut self.corrupt_next) {
            hash = digest("tampered");
        }

        let mut relayed = ReceivedMessage {
            sender: from.clone(),
            message: None,
            iv: Some(STANDARD.encode(nonce)),
            cipher: Some(cipher),
            hash: Some(hash),
            signature: Some(signature),
            extra: serde_json::Map::new(),
        };
        if self.echo_ids
            && let Some(id) = send.message_id
        {
            relayed.extra.insert("message_id".to_string(), Value::from(id));
        }

        if self.online.contains(&send.receiver) {
            self.emit(&send.receiver, ServerEvent::ReceiveMessage(relayed));
        } else {
            debug!(sender = %from, receiver = %send.receiver, "receiver offline, backlogged");
            self.backlog.entry((send.receiver, from.clone())).or_default().push(relayed);
        }
    }

    fn verify_message(&mut self, from: &PeerId, verify: VerifyMessage) {
        let VerifyMessage { received, request_id } = verify;
        let sender = received.sender.clone();
        let message_id = received.extra.get("message_id").and_then(Value::as_u64);
        let (request_id, message_id) =
            if self.echo_ids { (request_id, message_id) } else { (None, None) };

        let Some(key) = self.sessions.get(&pair(from, &sender)) else {
            self.chat_error(from, SESSION_NOT_ESTABLISHED);
            return;
        };

        match self.authenticate(key, &received) {
            Some(plaintext) => {
                self.emit(
                    from,
                    ServerEvent::MessageVerified(MessageVerified {
                        sender: sender.clone(),
                        status: STATUS_SUCCESS.to_string(),
                        message: Some(plaintext.clone()),
                        request_id,
                    }),
                );
                self.emit(
                    &sender,
                    ServerEvent::MessageStatus(MessageStatus {
                        receiver: from.clone(),
                        status: STATUS_DELIVERED.to_string(),
                        message: Some(plaintext),
                        error: None,
                        message_id,
                    }),
                );
            },
            None => {
                debug!(verifier = %from, sender = %sender, "verification failed");
                self.emit(
                    from,
                    ServerEvent::MessageVerified(MessageVerified {
                        sender: sender.clone(),
                        status: "error".to_string(),
                        message: Some(VERIFICATION_FAILED.to_string()),
                        request_id,
                    }),
                );
                self.emit(
                    &sender,
                    ServerEvent::MessageStatus(MessageStatus {
                        receiver: from.clone(),
                        status: "failed".to_string(),
                        message: None,
                        error: Some("Verification failed".to_string()),
                        message_id,
                    }),
                );
            },
        }
    }

    /// Plaintext if hash, signature and seal all check out.
    fn authenticate(&self, key: &SessionKey, received: &ReceivedMessage) -> Option<String> {
        let cipher = received.cipher.as_deref()?;
        let hash = received.hash.as_deref()?;
        if digest(cipher) != hash {
            return None;
        }

        let sender = self.users.get(&received.sender)?;
        let signature = STANDARD.decode(received.signature.as_deref()?).ok()?;
        let signature = Signature::from_slice(&signature).ok()?;
        sender.verifying_key().verify(hash.as_bytes(), &signature).ok()?;

        let sealed = STANDARD.decode(cipher).ok()?;
        let plaintext = open_message(key, &sealed).ok()?;
        String::from_utf8(plaintext).ok()
    }

    fn chat_error(&mut self, to: &PeerId, message: &str) {
        self.emit(to, ServerEvent::ChatError(ChatError { message: message.to_string() }));
    }

    /// Queue an event for an online user. Events for offline users are lost.
    fn emit(&mut self, to: &PeerId, event: ServerEvent) {
        if self.online.contains(to) {
            self.outbox.push_back((to.clone(), event));
        } else {
            trace!(user = %to, event = %event.event(), "dropped, user offline");
        }
    }
}

fn digest(input: &str) -> String {
    Sha256::digest(input.as_bytes()).iter().map(|b| format!("{b:02x}")).collect()
}
