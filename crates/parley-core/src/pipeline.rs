//! Message pipeline: send gating, receive-then-verify, delivery status.
//!
//! The pipeline owns the conversation view model and reads session state
//! through `&SessionManager`. It never changes a session.
//!
//! # Correlation
//!
//! Outbound messages carry a `message_id` and verification requests carry a
//! `request_id`. A reply that echoes an id must match exactly; an id that
//! matches nothing is stale. A reply without an id falls back to the most
//! recent candidate entry, which is only sound when the transport delivers
//! replies in request order.

use std::time::Duration;

use parley_proto::{
    EventName, PeerId,
    payloads::message::{MessageStatus, MessageVerified, ReceivedMessage, SendMessage, VerifyMessage},
};
use tracing::{debug, warn};

use crate::{
    conversation::{
        Conversation, Delivery, Entry, InboundMessage, MessageId, NoticeLevel, OutboundMessage,
        RequestId, Verification,
    },
    env::Timestamp,
    error::{CoreError, NotReadyReason},
    session::{SessionManager, SessionState},
};

/// What to do with a received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Sender is active: a pending entry was added, emit this verification
    Verify(VerifyMessage),
    /// Sender is not active: raise its unread indicator
    MarkUnread(PeerId),
}

/// Send and receive paths for the active conversation.
#[derive(Debug, Clone)]
pub struct MessagePipeline<I> {
    conversation: Conversation<I>,
}

impl<I> Default for MessagePipeline<I> {
    fn default() -> Self {
        Self { conversation: Conversation::new() }
    }
}

impl<I: Timestamp> MessagePipeline<I> {
    /// Pipeline with an empty conversation.
    pub fn new() -> Self {
        Self::default()
    }

    /// The active conversation.
    pub fn conversation(&self) -> &Conversation<I> {
        &self.conversation
    }

    /// Start a fresh conversation with `peer`.
    pub fn reset(&mut self, peer: PeerId) {
        self.conversation.reset(peer);
    }

    /// Append a system notice to the conversation.
    pub fn push_notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        self.conversation.push_notice(level, text);
    }

    /// Validate and record an outbound message. See [`Self::send_with`].
    ///
    /// # Errors
    ///
    /// As [`Self::send_with`].
    pub fn send(
        &mut self,
        sessions: &SessionManager<I>,
        text: &str,
        id: MessageId,
        now: I,
    ) -> Result<SendMessage, CoreError> {
        self.send_with(sessions, text, id, now, |plaintext| Ok(plaintext.to_string()))
    }

    /// Validate and record an outbound message, passing the trimmed text
    /// through `seal` to produce the wire body.
    ///
    /// The plaintext entry is appended optimistically; delivery is annotated
    /// later.
    ///
    /// # Errors
    ///
    /// - `CoreError::NotReady` if the text is blank, no peer is selected, or
    ///   the selected session is not established
    /// - Whatever `seal` returns; nothing is recorded in that case
    pub fn send_with<F>(
        &mut self,
        sessions: &SessionManager<I>,
        text: &str,
        id: MessageId,
        now: I,
        seal: F,
    ) -> Result<SendMessage, CoreError>
    where
        F: FnOnce(&str) -> Result<String, CoreError>,
    {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::NotReady { reason: NotReadyReason::EmptyMessage });
        }
        let Some(session) = sessions.active_session() else {
            return Err(CoreError::NotReady { reason: NotReadyReason::NoActivePeer });
        };
        if session.state() != SessionState::Established {
            return Err(CoreError::NotReady {
                reason: NotReadyReason::SessionNotEstablished(session.state()),
            });
        }

        let body = seal(text)?;
        let peer = session.peer().clone();
        self.conversation.push_sent(OutboundMessage {
            id,
            peer: peer.clone(),
            plaintext: text.to_string(),
            sent_at: now,
            delivery: None,
        });
        Ok(SendMessage { receiver: peer, message: body, message_id: Some(id) })
    }

    /// Route a received message.
    ///
    /// Messages from the active peer become pending entries awaiting
    /// verification. Everything else is left to the unread tracker.
    pub fn on_receive(
        &mut self,
        sessions: &SessionManager<I>,
        received: ReceivedMessage,
        request_id: RequestId,
        now: I,
    ) -> ReceiveOutcome {
        if !sessions.is_active(&received.sender) {
            return ReceiveOutcome::MarkUnread(received.sender);
        }

        let verify = VerifyMessage { received: received.clone(), request_id: Some(request_id) };
        self.conversation.push_received(InboundMessage {
            request_id,
            received,
            payload: None,
            received_at: now,
            verification: Verification::Pending,
        });
        ReceiveOutcome::Verify(verify)
    }

    /// Apply a verification outcome. See [`Self::on_verified_with`].
    ///
    /// # Errors
    ///
    /// As [`Self::on_verified_with`].
    pub fn on_verified(
        &mut self,
        sessions: &SessionManager<I>,
        verified: &MessageVerified,
    ) -> Result<RequestId, CoreError> {
        self.on_verified_with(sessions, verified, |payload| Ok(payload.to_string()))
    }

    /// Apply a verification outcome, passing the authenticated payload
    /// through `open` before it is shown.
    ///
    /// On success the pending entry is finalized with the opened payload. On
    /// failure, or if `open` fails, the entry is removed.
    ///
    /// # Errors
    ///
    /// - `CoreError::StaleEventIgnored` if the sender is not active or no
    ///   pending entry matches
    /// - `CoreError::VerificationFailure` if the message was rejected
    pub fn on_verified_with<F>(
        &mut self,
        sessions: &SessionManager<I>,
        verified: &MessageVerified,
        open: F,
    ) -> Result<RequestId, CoreError>
    where
        F: FnOnce(&str) -> Result<String, String>,
    {
        let stale = || CoreError::StaleEventIgnored {
            event: EventName::MessageVerified.as_str(),
            peer: verified.sender.clone(),
        };

        if !sessions.is_active(&verified.sender) {
            debug!(sender = %verified.sender, "verification for inactive peer");
            return Err(stale());
        }
        let Some(index) = self.conversation.find_pending(verified.request_id) else {
            debug!(sender = %verified.sender, request_id = ?verified.request_id, "no pending entry");
            return Err(stale());
        };

        let opened = if verified.is_success() {
            self.conversation.received_mut(index).map(|message| {
                let payload = verified
                    .message
                    .as_deref()
                    .or(message.received.message.as_deref())
                    .unwrap_or_default();
                open(payload)
            })
        } else {
            Some(Err(format!("server reported status {:?}", verified.status)))
        };

        match opened {
            Some(Ok(payload)) => {
                let message = self.conversation.received_mut(index).ok_or_else(stale)?;
                message.payload = Some(payload);
                message.verification = Verification::Verified;
                Ok(message.request_id)
            },
            Some(Err(reason)) => {
                self.conversation.reject(index);
                warn!(sender = %verified.sender, %reason, "message verification failed");
                Err(CoreError::VerificationFailure { peer: verified.sender.clone(), reason })
            },
            None => Err(stale()),
        }
    }

    /// Annotate an outbound message with its delivery outcome.
    ///
    /// # Errors
    ///
    /// - `CoreError::StaleEventIgnored` if the receiver is not active or no
    ///   outbound entry matches
    pub fn on_delivery_status(
        &mut self,
        sessions: &SessionManager<I>,
        status: &MessageStatus,
    ) -> Result<(MessageId, Delivery), CoreError> {
        let stale = || CoreError::StaleEventIgnored {
            event: EventName::MessageStatus.as_str(),
            peer: status.receiver.clone(),
        };

        if !sessions.is_active(&status.receiver) {
            debug!(receiver = %status.receiver, "delivery status for inactive peer");
            return Err(stale());
        }
        let message = self
            .conversation
            .find_sent(status.message_id)
            .and_then(|index| self.conversation.sent_mut(index))
            .ok_or_else(stale)?;

        let delivery = if status.is_delivered() {
            Delivery::Delivered
        } else {
            warn!(receiver = %status.receiver, status = %status.status, error = ?status.error, "delivery failed");
            Delivery::Failed
        };
        message.delivery = Some(delivery);
        Ok((message.id, delivery))
    }

    /// Discard pending entries that have waited at least `timeout`.
    ///
    /// Returns one `VerificationFailure` per discarded entry.
    pub fn expire_verifications(&mut self, now: I, timeout: Duration) -> Vec<CoreError> {
        let mut expired = Vec::new();
        while let Some(index) = self.conversation.entries().iter().position(|entry| {
            matches!(
                entry,
                Entry::Received(message)
                    if message.is_pending()
                        && now >= message.received_at
                        && now - message.received_at >= timeout
            )
        }) {
            if let Some(message) = self.conversation.reject(index) {
                warn!(sender = %message.sender(), request_id = message.request_id, "verification timed out");
                expired.push(CoreError::VerificationFailure {
                    peer: message.sender().clone(),
                    reason: format!("no verification within {timeout:?}"),
                });
            }
        }
        expired
    }
}
