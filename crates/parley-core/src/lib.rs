//! Parley Core
//!
//! Sans-IO state machines for a per-peer secure chat client. Nothing here
//! performs I/O: handlers consume events and return the requests the caller
//! must put on the wire.
//!
//! # Components
//!
//! - [`SessionManager`]: one session state machine per peer, the active
//!   selection, key exchange and session reuse
//! - [`MessagePipeline`]: send gating, the two-phase receive-then-verify flow,
//!   and delivery-status correlation
//! - [`UnreadTracker`] and [`PeerDirectory`]: known peers and their unread
//!   flags
//! - [`Conversation`]: view model of the active conversation
//!
//! # Single Writer
//!
//! Each piece of state has exactly one writer. The session table and the
//! active peer are written only by [`SessionManager`]; the pipeline and the
//! unread tracker receive `&SessionManager` and read from it. No locking is
//! needed because no state is shared mutably.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod conversation;
pub mod directory;
pub mod env;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod unread;

pub use conversation::{
    Conversation, Delivery, Entry, InboundMessage, MessageId, NoticeLevel, OutboundMessage,
    RequestId, Verification,
};
pub use directory::PeerDirectory;
pub use env::{Environment, Timestamp};
pub use error::{CoreError, NotReadyReason};
pub use pipeline::{MessagePipeline, ReceiveOutcome};
pub use session::{KeyExchangeOutcome, Session, SessionManager, SessionState};
pub use unread::{UnreadMark, UnreadTracker};
