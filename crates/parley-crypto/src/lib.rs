//! Parley Cryptographic Capability
//!
//! The client core never touches key material directly. Everything it needs
//! from cryptography goes through the [`CryptoProvider`] capability:
//!
//! - unwrap and authenticate a session key received in `aes_key_exchange`
//! - seal and open message bodies under an established [`SessionKey`]
//!
//! [`SealedKeyProvider`] is the production implementation. Functions are pure:
//! callers provide every random input (ephemeral secrets, nonces), which keeps
//! the client deterministic under simulation.
//!
//! # Key Wrapping
//!
//! ```text
//! issuer ephemeral X25519 ──┐
//!                           ├─ ECDH ─→ HKDF-SHA256 ─→ key-encryption key
//! recipient static X25519 ──┘                                 │
//!                                                             ▼
//!                     session key ─→ XChaCha20-Poly1305 ─→ encrypted_aes_key
//! ```
//!
//! The session metadata `"{initiator}:{responder}"` is signed with the
//! initiator's Ed25519 key. A recipient accepts the exchange only if that
//! signature verifies.
//!
//! # Security
//!
//! - Session keys are zeroized on drop and never implement `Debug` output of
//!   their bytes.
//! - Message nonces are 24 random bytes; XChaCha20 makes random nonces safe.
//! - Any authentication failure rejects the input; there is no partial
//!   success.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod provider;
mod sealed;

pub use error::CryptoError;
pub use provider::{CryptoProvider, NONCE_SIZE, SESSION_KEY_SIZE, SessionKey};
pub use sealed::{
    SealedKeyProvider, open_message, seal_message, seal_session_key, session_metadata, sign_session,
};
