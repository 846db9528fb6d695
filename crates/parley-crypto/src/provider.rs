//! The cryptographic capability seen by the client core.

use std::fmt;

use parley_proto::PeerId;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::CryptoError;

/// Size of a session key in bytes.
pub const SESSION_KEY_SIZE: usize = 32;

/// Size of the random message nonce in bytes.
pub const NONCE_SIZE: usize = 24;

/// Symmetric key of an established session.
///
/// Owned exclusively by one session. Zeroized when dropped, which happens
/// when the session re-negotiates or the process ends.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Cryptographic operations the client core depends on.
///
/// Implementations must be deterministic given their inputs; randomness is
/// supplied by the caller through `nonce`.
pub trait CryptoProvider: Send + Sync {
    /// Unwrap and authenticate the session key from an `aes_key_exchange`.
    ///
    /// `encrypted_key` and `signature` are the wire strings; `sender` is the
    /// peer the session is with.
    fn decrypt_session_key(
        &self,
        encrypted_key: &str,
        signature: &str,
        sender: &PeerId,
    ) -> Result<SessionKey, CryptoError>;

    /// Seal `plaintext` under `key`. Output is `nonce || ciphertext`.
    fn encrypt(
        &self,
        key: &SessionKey,
        plaintext: &[u8],
        nonce: [u8; NONCE_SIZE],
    ) -> Result<Vec<u8>, CryptoError>;

    /// Open a `nonce || ciphertext` blob sealed by [`CryptoProvider::encrypt`].
    fn decrypt(&self, key: &SessionKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_debug_is_redacted() {
        let key = SessionKey::from_bytes([0xAB; SESSION_KEY_SIZE]);
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("ab"));
        assert!(!rendered.contains("171"));
        assert!(rendered.contains("redacted"));
    }
}
