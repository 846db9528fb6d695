//! Conversation view model.
//!
//! The conversation shows exactly one peer at a time. It is cleared when a
//! peer is selected, so every entry it holds belongs to the active peer.

use parley_proto::{PeerId, payloads::message::ReceivedMessage};

/// Correlation id of an outbound message, echoed in `message_status`.
pub type MessageId = u64;

/// Correlation id of a verification request, echoed in `message_verified`.
pub type RequestId = u64;

/// Placeholder shown for a message still awaiting verification.
pub const VERIFYING_PLACEHOLDER: &str = "Verifying message...";

/// Severity of a system notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Progress and status information
    Info,
    /// Something failed
    Error,
}

/// Delivery outcome of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Server reported delivery
    Delivered,
    /// Server reported a failure
    Failed,
}

/// Verification state of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Awaiting the server's verdict; rendered as a placeholder
    Pending,
    /// Authenticated; the payload is final
    Verified,
    /// Failed verification; never rendered
    Rejected,
}

/// A message the local user sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage<I> {
    /// Correlation id carried as `message_id`.
    pub id: MessageId,
    /// Receiver.
    pub peer: PeerId,
    /// Text as typed (trimmed).
    pub plaintext: String,
    /// When the message was submitted.
    pub sent_at: I,
    /// Delivery outcome, once known.
    pub delivery: Option<Delivery>,
}

/// A message received from the active peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage<I> {
    /// Correlation id carried as `request_id`.
    pub request_id: RequestId,
    /// The event as received; echoed verbatim in `verify_message`.
    pub received: ReceivedMessage,
    /// Authenticated payload. `None` until verified.
    pub payload: Option<String>,
    /// When the message arrived.
    pub received_at: I,
    /// Verification state.
    pub verification: Verification,
}

impl<I> InboundMessage<I> {
    /// Sender of the message.
    pub fn sender(&self) -> &PeerId {
        &self.received.sender
    }

    /// Whether the message still awaits verification.
    pub fn is_pending(&self) -> bool {
        self.verification == Verification::Pending
    }
}

/// One line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry<I> {
    /// System notice
    Notice {
        /// Severity
        level: NoticeLevel,
        /// Notice text
        text: String,
    },
    /// Outbound message
    Sent(OutboundMessage<I>),
    /// Inbound message
    Received(InboundMessage<I>),
}

impl<I> Entry<I> {
    /// Text to render for this entry.
    pub fn display_text(&self) -> &str {
        match self {
            Self::Notice { text, .. } => text,
            Self::Sent(message) => &message.plaintext,
            Self::Received(message) => match (&message.verification, &message.payload) {
                (Verification::Verified, Some(payload)) => payload,
                _ => VERIFYING_PLACEHOLDER,
            },
        }
    }
}

/// Entries of the active conversation, oldest first.
#[derive(Debug, Clone)]
pub struct Conversation<I> {
    peer: Option<PeerId>,
    entries: Vec<Entry<I>>,
}

impl<I> Default for Conversation<I> {
    fn default() -> Self {
        Self { peer: None, entries: Vec::new() }
    }
}

impl<I> Conversation<I> {
    /// Empty conversation with no peer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Peer the conversation is with.
    pub fn peer(&self) -> Option<&PeerId> {
        self.peer.as_ref()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[Entry<I>] {
        &self.entries
    }

    /// Clear all entries and bind to `peer`.
    pub fn reset(&mut self, peer: PeerId) {
        self.peer = Some(peer);
        self.entries.clear();
    }

    /// Append a system notice.
    pub fn push_notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.entries.push(Entry::Notice { level, text: text.into() });
    }

    pub(crate) fn push_sent(&mut self, message: OutboundMessage<I>) {
        self.entries.push(Entry::Sent(message));
    }

    pub(crate) fn push_received(&mut self, message: InboundMessage<I>) {
        self.entries.push(Entry::Received(message));
    }

    /// Inbound messages still awaiting verification.
    pub fn pending(&self) -> impl Iterator<Item = &InboundMessage<I>> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Received(message) if message.is_pending() => Some(message),
            _ => None,
        })
    }

    /// Number of inbound messages awaiting verification.
    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Outbound messages, oldest first.
    pub fn sent(&self) -> impl Iterator<Item = &OutboundMessage<I>> {
        self.entries.iter().filter_map(|entry| match entry {
            Entry::Sent(message) => Some(message),
            _ => None,
        })
    }

    /// Index of the pending entry a verification reply refers to.
    ///
    /// With an id, only an exact match counts. Without one, the most
    /// recently inserted pending entry is chosen.
    pub(crate) fn find_pending(&self, request_id: Option<RequestId>) -> Option<usize> {
        self.entries.iter().rposition(|entry| match entry {
            Entry::Received(message) if message.is_pending() => {
                request_id.is_none_or(|id| message.request_id == id)
            },
            _ => false,
        })
    }

    /// Index of the outbound entry a delivery status refers to.
    ///
    /// With an id, only an exact match counts. Without one, the most
    /// recently sent entry is chosen.
    pub(crate) fn find_sent(&self, message_id: Option<MessageId>) -> Option<usize> {
        self.entries.iter().rposition(|entry| match entry {
            Entry::Sent(message) => message_id.is_none_or(|id| message.id == id),
            _ => false,
        })
    }

    pub(crate) fn received_mut(&mut self, index: usize) -> Option<&mut InboundMessage<I>> {
        match self.entries.get_mut(index) {
            Some(Entry::Received(message)) => Some(message),
            _ => None,
        }
    }

    pub(crate) fn sent_mut(&mut self, index: usize) -> Option<&mut OutboundMessage<I>> {
        match self.entries.get_mut(index) {
            Some(Entry::Sent(message)) => Some(message),
            _ => None,
        }
    }

    /// Remove an inbound entry, marking it rejected.
    pub(crate) fn reject(&mut self, index: usize) -> Option<InboundMessage<I>> {
        if !matches!(self.entries.get(index), Some(Entry::Received(_))) {
            return None;
        }
        match self.entries.remove(index) {
            Entry::Received(mut message) => {
                message.verification = Verification::Rejected;
                Some(message)
            },
            Entry::Notice { .. } | Entry::Sent(_) => None,
        }
    }
}
