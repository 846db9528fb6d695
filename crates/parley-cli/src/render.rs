//! Line-oriented rendering of the conversation.
//!
//! A terminal scrolls, so lines cannot be edited once printed. The renderer
//! remembers what it printed last and only prints from the first line that
//! changed: a placeholder replaced by its verified text shows up again as a
//! new line, and a rejected message causes the tail to be reprinted.

use parley_client::Client;
use parley_core::{Delivery, Entry, Environment, NoticeLevel};
use parley_crypto::CryptoProvider;
use parley_proto::PeerId;

/// Formats client state as text lines.
#[derive(Debug, Default)]
pub struct LineRenderer {
    printed: Vec<String>,
    peer: Option<PeerId>,
    unread: Vec<PeerId>,
}

impl LineRenderer {
    /// Renderer that has printed nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print for the current state of `client`.
    pub fn update<E: Environment, C: CryptoProvider>(&mut self, client: &Client<E, C>) -> Vec<String> {
        let mut out = Vec::new();

        let peer = client.conversation().peer().cloned();
        if peer != self.peer {
            if let Some(peer) = &peer {
                out.push(format!("--- {peer} ---"));
            }
            self.printed.clear();
            self.peer = peer;
        }

        let local = client.local_user();
        let lines: Vec<String> =
            client.conversation().entries().iter().map(|e| format_entry(local, e)).collect();
        let unchanged = self.printed.iter().zip(&lines).take_while(|(a, b)| a == b).count();
        out.extend(lines[unchanged..].iter().cloned());
        self.printed = lines;

        let unread: Vec<PeerId> = client.unread().unread_peers().into_iter().cloned().collect();
        if unread != self.unread {
            if !unread.is_empty() {
                let names: Vec<_> = unread.iter().map(PeerId::as_str).collect();
                out.push(format!("* unread: {}", names.join(", ")));
            }
            self.unread = unread;
        }

        out
    }
}

/// One display line for a conversation entry.
pub fn format_entry<I>(local: &PeerId, entry: &Entry<I>) -> String {
    match entry {
        Entry::Notice { level: NoticeLevel::Info, text } => format!("* {text}"),
        Entry::Notice { level: NoticeLevel::Error, text } => format!("! {text}"),
        Entry::Sent(message) => {
            let marker = match message.delivery {
                None => "",
                Some(Delivery::Delivered) => " (delivered)",
                Some(Delivery::Failed) => " (failed)",
            };
            format!("{local}: {}{marker}", message.plaintext)
        },
        Entry::Received(message) => format!("{}: {}", message.sender(), entry.display_text()),
    }
}
