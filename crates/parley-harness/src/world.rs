//! Several clients wired to one simulated server.
//!
//! [`SimWorld`] runs the real [`Client`] state machines against a
//! [`SimServer`] without any transport. Requests reach the server as soon as
//! a client emits them; server events wait in its outbox until the test
//! delivers them, either in emission order ([`SimWorld::deliver_all`]) or in
//! any order it likes ([`SimWorld::take_deliveries`] plus
//! [`SimWorld::deliver`]).

use std::{collections::BTreeMap, time::Duration};

use parley_client::{Client, ClientAction, ClientConfig, ClientEvent, Notice};
use parley_core::Environment;
use parley_crypto::SealedKeyProvider;
use parley_proto::{ClientRequest, PeerId, ServerEvent};
use tracing::{trace, warn};

use crate::{
    SimEnv, SimIdentity, SimServer,
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot, Violation},
};

/// Client type run by the world.
pub type SimClient = Client<SimEnv, SealedKeyProvider>;

/// Upper bound on delivery rounds in one [`SimWorld::deliver_all`].
const MAX_DELIVERY_ROUNDS: usize = 1_000;

struct Node {
    client: SimClient,
    online: bool,
    started: bool,
    notices: Vec<Notice>,
    sent: Vec<ClientRequest>,
}

/// Clients plus server, driven step by step.
pub struct SimWorld {
    env: SimEnv,
    server: SimServer,
    nodes: BTreeMap<PeerId, Node>,
    invariants: InvariantRegistry,
}

impl SimWorld {
    /// World where every user knows every other user, with default client
    /// configuration.
    pub fn new(users: &[&str], seed: u64) -> Self {
        Self::build(users, seed, SimServer::new(seed), |config| config)
    }

    /// World with a custom server and client configuration.
    ///
    /// `configure` receives each user's default configuration (local user and
    /// peer list filled in).
    pub fn build(
        users: &[&str],
        seed: u64,
        mut server: SimServer,
        configure: impl Fn(ClientConfig) -> ClientConfig,
    ) -> Self {
        let env = SimEnv::with_seed(seed);
        let identities: Vec<_> = users
            .iter()
            .enumerate()
            .map(|(i, user)| SimIdentity::from_seed(*user, seed.wrapping_add(i as u64 + 1)))
            .collect();

        let mut nodes = BTreeMap::new();
        for (i, identity) in identities.iter().enumerate() {
            let others: Vec<_> = identities.iter().filter(|o| o.id() != identity.id()).collect();
            let config = configure(
                ClientConfig::new(identity.id().clone())
                    .with_peers(others.iter().map(|o| o.id().clone())),
            );
            let provider = identity.provider(others.iter().copied());
            let client_env = env.fork(seed.wrapping_mul(31).wrapping_add(i as u64));

            nodes.insert(identity.id().clone(), Node {
                client: Client::new(client_env, provider, config),
                online: false,
                started: false,
                notices: Vec::new(),
                sent: Vec::new(),
            });
        }

        for identity in identities {
            server.register(identity);
        }

        Self { env, server, nodes, invariants: InvariantRegistry::standard() }
    }

    /// Connect `user` to the server. The first connection starts the client;
    /// later ones report a reconnection.
    pub fn connect(&mut self, user: &str) {
        let user = PeerId::new(user);
        let Some(node) = self.nodes.get_mut(&user) else {
            warn!(user = %user, "connect for unknown user");
            return;
        };

        node.online = true;
        let actions = if node.started {
            node.client.handle(ClientEvent::Connected)
        } else {
            node.started = true;
            node.client.start()
        };
        execute(&mut self.server, &user, node, actions);
    }

    /// Drop `user`'s connection. The server forgets they are online and the
    /// client sees a disconnect.
    pub fn disconnect(&mut self, user: &str) {
        let user = PeerId::new(user);
        self.server.disconnect(&user);
        if let Some(node) = self.nodes.get_mut(&user) {
            node.online = false;
            let actions = node.client.handle(ClientEvent::Received(ServerEvent::Disconnect));
            execute(&mut self.server, &user, node, actions);
        }
    }

    /// Feed a client event to `user` and run the resulting actions.
    pub fn input(&mut self, user: &str, event: ClientEvent<Duration>) -> Vec<ClientAction> {
        let user = PeerId::new(user);
        let Some(node) = self.nodes.get_mut(&user) else {
            warn!(user = %user, "input for unknown user");
            return Vec::new();
        };

        let actions = node.client.handle(event);
        execute(&mut self.server, &user, node, actions.clone());
        actions
    }

    /// `user` opens the conversation with `peer`.
    pub fn select(&mut self, user: &str, peer: &str) {
        self.input(user, ClientEvent::SelectPeer { peer: peer.into() });
    }

    /// `user` sends `text` to their active peer.
    pub fn send(&mut self, user: &str, text: &str) {
        self.input(user, ClientEvent::SendMessage { text: text.to_string() });
    }

    /// `user` asks for `peer`'s unread backlog.
    pub fn load_unread(&mut self, user: &str, peer: &str) {
        self.input(user, ClientEvent::LoadUnreadMessages { peer: peer.into() });
    }

    /// Deliver queued server events until the server goes quiet. Returns the
    /// number delivered.
    pub fn deliver_all(&mut self) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_DELIVERY_ROUNDS {
            if !self.server.has_pending() {
                return delivered;
            }
            for (to, event) in self.server.drain() {
                self.deliver(&to, event);
                delivered += 1;
            }
        }

        warn!(delivered, "delivery did not settle");
        delivered
    }

    /// Take queued server events without delivering them.
    pub fn take_deliveries(&mut self) -> Vec<(PeerId, ServerEvent)> {
        self.server.drain()
    }

    /// Deliver one server event to `to`. Dropped if `to` is offline.
    pub fn deliver(&mut self, to: &PeerId, event: ServerEvent) {
        let Some(node) = self.nodes.get_mut(to) else {
            return;
        };
        if !node.online {
            trace!(user = %to, "delivery dropped, offline");
            return;
        }

        let actions = node.client.handle(ClientEvent::Received(event));
        execute(&mut self.server, to, node, actions);
    }

    /// Advance the shared clock and tick every online client.
    pub fn advance(&mut self, by: Duration) {
        self.env.advance(by);
        let now = self.env.now();

        for (user, node) in &mut self.nodes {
            if node.online {
                let actions = node.client.handle(ClientEvent::Tick { now });
                execute(&mut self.server, user, node, actions);
            }
        }
    }

    /// The client of `user`.
    pub fn client(&self, user: &str) -> Option<&SimClient> {
        self.nodes.get(&PeerId::new(user)).map(|node| &node.client)
    }

    /// Notices `user`'s client has raised so far.
    pub fn notices(&self, user: &str) -> &[Notice] {
        self.nodes.get(&PeerId::new(user)).map(|node| node.notices.as_slice()).unwrap_or_default()
    }

    /// Requests `user`'s client has put on the wire so far.
    pub fn requests(&self, user: &str) -> &[ClientRequest] {
        self.nodes.get(&PeerId::new(user)).map(|node| node.sent.as_slice()).unwrap_or_default()
    }

    /// The server.
    pub fn server(&self) -> &SimServer {
        &self.server
    }

    /// The server, for fault injection.
    pub fn server_mut(&mut self) -> &mut SimServer {
        &mut self.server
    }

    /// Snapshot of every client.
    pub fn snapshot(&self) -> SystemSnapshot {
        self.nodes.values().map(|node| ClientSnapshot::from_client(&node.client)).collect()
    }

    /// Check the standard invariants against every client.
    pub fn check_invariants(&self) -> Result<(), Vec<Violation>> {
        self.invariants.check_all(&self.snapshot())
    }
}

fn execute(server: &mut SimServer, user: &PeerId, node: &mut Node, actions: Vec<ClientAction>) {
    for action in actions {
        match action {
            ClientAction::Send(request) => {
                node.sent.push(request.clone());
                if node.online {
                    server.handle(user, request);
                } else {
                    trace!(user = %user, event = %request.event(), "request lost, offline");
                }
            },
            ClientAction::Notice(notice) => node.notices.push(notice),
            ClientAction::SendEnabled(_)
            | ClientAction::UnreadChanged { .. }
            | ClientAction::Render => {},
        }
    }
}
