//! Client state machine.
//!
//! The `Client` owns the session manager, the message pipeline, the peer
//! directory and the unread tracker, and routes every event to the one
//! component that owns the affected state.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use parley_core::{
    Conversation, CoreError, Environment, KeyExchangeOutcome, MessagePipeline, NotReadyReason,
    NoticeLevel, PeerDirectory, ReceiveOutcome, Session, SessionManager, SessionState, UnreadMark,
    UnreadTracker,
};
use parley_crypto::{CryptoProvider, NONCE_SIZE, SessionKey};
use parley_proto::{
    ClientRequest, PeerId, ServerEvent,
    payloads::{
        message::{MessageStatus, MessageVerified, ReceivedMessage},
        session::{KeyExchange, LoadUnreadMessages},
    },
};
use tracing::{debug, info};

use crate::{
    config::ClientConfig,
    event::{ClientAction, ClientEvent, Notice},
};

const ESTABLISHING: &str = "Establishing secure connection...";
const CONNECT_ERROR: &str = "Connection error. Please try again later.";

/// Client for a Parley chat server.
///
/// Generic over the environment (time, randomness) and the crypto provider
/// so the same logic runs in production and in simulation.
pub struct Client<E: Environment, C: CryptoProvider> {
    env: E,
    crypto: C,
    config: ClientConfig,
    sessions: SessionManager<E::Instant>,
    pipeline: MessagePipeline<E::Instant>,
    directory: PeerDirectory,
    unread: UnreadTracker,
    connected: bool,
}

impl<E: Environment, C: CryptoProvider> Client<E, C> {
    /// Create a client. Call [`Client::start`] once the transport is up.
    pub fn new(env: E, crypto: C, config: ClientConfig) -> Self {
        let directory = PeerDirectory::new(config.peers.iter().cloned());
        Self {
            env,
            crypto,
            sessions: SessionManager::new(config.local_user.clone()),
            pipeline: MessagePipeline::new(),
            directory,
            unread: UnreadTracker::new(),
            connected: false,
            config,
        }
    }

    /// Local user.
    pub fn local_user(&self) -> &PeerId {
        &self.config.local_user
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Currently selected peer.
    pub fn active_peer(&self) -> Option<&PeerId> {
        self.sessions.active_peer()
    }

    /// Whether a message may be sent to the selected peer.
    pub fn can_send(&self) -> bool {
        self.sessions.can_send()
    }

    /// State of the session with `peer`. `None` if never selected.
    pub fn session_state(&self, peer: &PeerId) -> Option<SessionState> {
        self.sessions.session(peer).map(Session::state)
    }

    /// Whether the transport is believed to be up.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether `peer` has its unread indicator up.
    pub fn is_unread(&self, peer: &PeerId) -> bool {
        self.unread.is_unread(peer)
    }

    /// The active conversation.
    pub fn conversation(&self) -> &Conversation<E::Instant> {
        self.pipeline.conversation()
    }

    /// Session table and active selection.
    pub fn sessions(&self) -> &SessionManager<E::Instant> {
        &self.sessions
    }

    /// Unread indicators.
    pub fn unread(&self) -> &UnreadTracker {
        &self.unread
    }

    /// Known peers.
    pub fn directory(&self) -> &PeerDirectory {
        &self.directory
    }

    /// Actions to run once the transport is connected.
    pub fn start(&mut self) -> Vec<ClientAction> {
        self.connected = true;
        vec![ClientAction::Send(ClientRequest::Join)]
    }

    /// Process an event and return resulting actions.
    ///
    /// Never fails: user-visible errors become notices, stale replies are
    /// dropped.
    pub fn handle(&mut self, event: ClientEvent<E::Instant>) -> Vec<ClientAction> {
        let result = match event {
            ClientEvent::SelectPeer { peer } => Ok(self.handle_select_peer(peer)),
            ClientEvent::SendMessage { text } => self.handle_send(&text),
            ClientEvent::LoadUnreadMessages { peer } => {
                Ok(vec![ClientAction::Send(ClientRequest::LoadUnreadMessages(
                    LoadUnreadMessages { sender: peer },
                ))])
            },
            ClientEvent::Received(server_event) => self.handle_server_event(server_event),
            ClientEvent::Connected => Ok(self.handle_connected()),
            ClientEvent::Tick { now } => Ok(self.handle_tick(now)),
        };

        match result {
            Ok(actions) => actions,
            Err(err) => self.surface(err),
        }
    }

    fn handle_select_peer(&mut self, peer: PeerId) -> Vec<ClientAction> {
        let mut actions = vec![ClientAction::SendEnabled(false)];

        self.directory.register(peer.clone());
        if self.unread.clear(&peer) {
            actions.push(ClientAction::UnreadChanged { peer: peer.clone(), unread: false });
        }

        self.pipeline.reset(peer.clone());
        let request = self.sessions.select_peer(peer, self.env.now());
        actions.push(ClientAction::Send(ClientRequest::InitChat(request)));
        actions.extend(self.notice(NoticeLevel::Info, ESTABLISHING));
        actions
    }

    fn handle_send(&mut self, text: &str) -> Result<Vec<ClientAction>, CoreError> {
        let id = self.env.random_u64();
        let now = self.env.now();
        let sealing = sealing(&self.config, &self.sessions);
        let (env, crypto) = (&self.env, &self.crypto);

        let request = self.pipeline.send_with(&self.sessions, text, id, now, |plaintext| {
            match sealing {
                Sealing::Off => Ok(plaintext.to_string()),
                Sealing::Key(key) => seal(env, crypto, key, plaintext),
                Sealing::NoKey => {
                    Err(CoreError::NotReady { reason: NotReadyReason::NoSessionKey })
                },
            }
        })?;

        debug!(receiver = %request.receiver, message_id = id, "sending message");
        Ok(vec![ClientAction::Send(ClientRequest::SendMessage(request)), ClientAction::Render])
    }

    fn handle_server_event(&mut self, event: ServerEvent) -> Result<Vec<ClientAction>, CoreError> {
        match event {
            ServerEvent::KeyExchange(exchange) => self.handle_key_exchange(&exchange),
            ServerEvent::ReceiveMessage(received) => Ok(self.handle_receive(received)),
            ServerEvent::UnreadMessages(backlog) => {
                debug!(sender = %backlog.sender, count = backlog.messages.len(), "unread backlog");
                Ok(backlog.messages.into_iter().flat_map(|m| self.handle_receive(m)).collect())
            },
            ServerEvent::MessageVerified(verified) => self.handle_verified(&verified),
            ServerEvent::MessageStatus(status) => self.handle_status(&status),
            ServerEvent::ChatError(error) => Ok(self.notice(NoticeLevel::Error, error.message)),
            ServerEvent::ConnectError => Ok(self.notice(NoticeLevel::Error, CONNECT_ERROR)),
            ServerEvent::Disconnect => Err(self.handle_disconnect()),
        }
    }

    fn handle_key_exchange(
        &mut self,
        exchange: &KeyExchange,
    ) -> Result<Vec<ClientAction>, CoreError> {
        let outcome = self.sessions.on_key_exchange(exchange, &self.crypto, self.env.now())?;
        if outcome == KeyExchangeOutcome::Reused {
            debug!(peer = %exchange.sender, "reusing existing session");
            // a reused session carries no key to seal with
            if self.config.end_to_end
                && let Some(request) = self.sessions.request_fresh_key(self.env.now())
            {
                return Ok(vec![ClientAction::Send(ClientRequest::InitChat(request))]);
            }
        }

        let mut actions = vec![ClientAction::SendEnabled(true)];
        actions.extend(self.notice(
            NoticeLevel::Info,
            format!("Secure connection established with {}", exchange.sender),
        ));
        Ok(actions)
    }

    fn handle_receive(&mut self, received: ReceivedMessage) -> Vec<ClientAction> {
        let sender = received.sender.clone();
        if !self.sessions.is_active(&sender) && !self.directory.contains(&sender) {
            debug!(sender = %sender, "message from unknown peer ignored");
            return Vec::new();
        }

        let request_id = self.env.random_u64();
        match self.pipeline.on_receive(&self.sessions, received, request_id, self.env.now()) {
            ReceiveOutcome::Verify(verify) => {
                vec![ClientAction::Send(ClientRequest::VerifyMessage(verify)), ClientAction::Render]
            },
            ReceiveOutcome::MarkUnread(peer) => match self.unread.mark_unread(&peer) {
                UnreadMark::Raised => vec![ClientAction::UnreadChanged { peer, unread: true }],
                UnreadMark::AlreadyRaised => Vec::new(),
            },
        }
    }

    fn handle_verified(
        &mut self,
        verified: &MessageVerified,
    ) -> Result<Vec<ClientAction>, CoreError> {
        let sealing = sealing(&self.config, &self.sessions);
        let crypto = &self.crypto;

        let request_id =
            self.pipeline.on_verified_with(&self.sessions, verified, |payload| match sealing {
                Sealing::Off => Ok(payload.to_string()),
                Sealing::Key(key) => open(crypto, key, payload),
                Sealing::NoKey => Err("no session key to open the message with".to_string()),
            })?;

        debug!(sender = %verified.sender, request_id, "message verified");
        Ok(vec![ClientAction::Render])
    }

    fn handle_status(&mut self, status: &MessageStatus) -> Result<Vec<ClientAction>, CoreError> {
        let (id, delivery) = self.pipeline.on_delivery_status(&self.sessions, status)?;
        debug!(receiver = %status.receiver, message_id = id, ?delivery, "delivery status");
        Ok(vec![ClientAction::Render])
    }

    fn handle_disconnect(&mut self) -> CoreError {
        self.connected = false;
        if let Some(peer) = self.sessions.on_disconnect() {
            info!(peer = %peer, "transport lost, session suspended");
        }
        CoreError::TransportDisconnected
    }

    fn handle_connected(&mut self) -> Vec<ClientAction> {
        self.connected = true;
        let mut actions = vec![ClientAction::Send(ClientRequest::Join)];

        if let Some(request) = self.sessions.on_reconnect(self.env.now()) {
            actions.push(ClientAction::Send(ClientRequest::InitChat(request)));
            actions.extend(self.notice(NoticeLevel::Info, ESTABLISHING));
        }
        actions
    }

    fn handle_tick(&mut self, now: E::Instant) -> Vec<ClientAction> {
        let mut errors = Vec::new();

        if let Some(timeout) = self.config.key_exchange_timeout
            && let Err(err) = self.sessions.expire_key_exchange(now, timeout)
        {
            errors.push(err);
        }
        if let Some(timeout) = self.config.verification_timeout {
            errors.extend(self.pipeline.expire_verifications(now, timeout));
        }

        errors.into_iter().flat_map(|err| self.surface(err)).collect()
    }

    fn notice(&mut self, level: NoticeLevel, text: impl Into<String>) -> Vec<ClientAction> {
        let text = text.into();
        self.pipeline.push_notice(level, text.clone());
        vec![ClientAction::Notice(Notice { level, text }), ClientAction::Render]
    }

    fn surface(&mut self, err: CoreError) -> Vec<ClientAction> {
        if !err.is_user_visible() {
            debug!(error = %err, "ignored");
            return Vec::new();
        }

        let mut actions = vec![ClientAction::SendEnabled(self.sessions.can_send())];
        actions.extend(self.notice(NoticeLevel::Error, err.notice_text()));
        actions
    }
}

/// How message bodies are sealed for the selected peer.
#[derive(Clone, Copy)]
enum Sealing<'a> {
    /// Bodies travel as plaintext
    Off,
    /// Bodies are sealed under the session key
    Key(&'a SessionKey),
    /// Sealing is required but no key is held; nothing may pass
    NoKey,
}

fn sealing<'a, I: parley_core::Timestamp>(
    config: &ClientConfig,
    sessions: &'a SessionManager<I>,
) -> Sealing<'a> {
    if !config.end_to_end {
        return Sealing::Off;
    }
    sessions.active_key().map_or(Sealing::NoKey, Sealing::Key)
}

fn seal<E: Environment, C: CryptoProvider>(
    env: &E,
    crypto: &C,
    key: &SessionKey,
    plaintext: &str,
) -> Result<String, CoreError> {
    let mut nonce = [0u8; NONCE_SIZE];
    env.random_bytes(&mut nonce);
    let sealed = crypto.encrypt(key, plaintext.as_bytes(), nonce)?;
    Ok(STANDARD.encode(sealed))
}

fn open<C: CryptoProvider>(crypto: &C, key: &SessionKey, payload: &str) -> Result<String, String> {
    let sealed = STANDARD.decode(payload).map_err(|e| format!("body is not base64: {e}"))?;
    let plaintext = crypto.decrypt(key, &sealed).map_err(|e| e.to_string())?;
    String::from_utf8(plaintext).map_err(|e| format!("body is not UTF-8: {e}"))
}
