//! Counting crypto provider.
//!
//! Accepts any wrapped key except [`MockCrypto::REJECTED`] and derives the
//! session key from the wrapped key text, so tests can tell sessions apart
//! without real key material. Message sealing is a keyed XOR behind the
//! nonce, which is enough to check that bodies round-trip through the
//! correct key.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use parley_crypto::{CryptoError, CryptoProvider, NONCE_SIZE, SESSION_KEY_SIZE, SessionKey};
use parley_proto::PeerId;

/// Crypto provider for property and scenario tests.
///
/// Clones share their counters.
#[derive(Debug, Clone, Default)]
pub struct MockCrypto {
    unwraps: Arc<AtomicUsize>,
    seals: Arc<AtomicUsize>,
}

impl MockCrypto {
    /// Wrapped key text that fails to unwrap.
    pub const REJECTED: &'static str = "rejected";

    /// Create a provider with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `decrypt_session_key` calls so far.
    pub fn unwrap_count(&self) -> usize {
        self.unwraps.load(Ordering::SeqCst)
    }

    /// Number of `encrypt` calls so far.
    pub fn seal_count(&self) -> usize {
        self.seals.load(Ordering::SeqCst)
    }

    fn pad(key: &SessionKey) -> u8 {
        key.as_bytes().iter().fold(0u8, |acc, b| acc ^ b) | 1
    }
}

impl CryptoProvider for MockCrypto {
    fn decrypt_session_key(
        &self,
        encrypted_key: &str,
        _signature: &str,
        sender: &PeerId,
    ) -> Result<SessionKey, CryptoError> {
        self.unwraps.fetch_add(1, Ordering::SeqCst);
        if encrypted_key == Self::REJECTED {
            return Err(CryptoError::SignatureMismatch { sender: sender.clone() });
        }

        let mut bytes = [0u8; SESSION_KEY_SIZE];
        for (slot, b) in bytes.iter_mut().zip(encrypted_key.bytes().cycle()) {
            *slot = b;
        }
        Ok(SessionKey::from_bytes(bytes))
    }

    fn encrypt(
        &self,
        key: &SessionKey,
        plaintext: &[u8],
        nonce: [u8; NONCE_SIZE],
    ) -> Result<Vec<u8>, CryptoError> {
        self.seals.fetch_add(1, Ordering::SeqCst);
        let pad = Self::pad(key);
        let mut sealed = nonce.to_vec();
        sealed.extend(plaintext.iter().map(|b| b ^ pad));
        Ok(sealed)
    }

    fn decrypt(&self, key: &SessionKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let body = sealed.get(NONCE_SIZE..).ok_or(CryptoError::InvalidLength {
            field: "sealed message",
            expected: NONCE_SIZE,
            actual: sealed.len(),
        })?;
        let pad = Self::pad(key);
        Ok(body.iter().map(|b| b ^ pad).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejects_only_sentinel() {
        let crypto = MockCrypto::new();
        let peer = PeerId::new("bob");

        assert!(crypto.decrypt_session_key("abc", "sig", &peer).is_ok());
        assert!(matches!(
            crypto.decrypt_session_key(MockCrypto::REJECTED, "sig", &peer),
            Err(CryptoError::SignatureMismatch { .. })
        ));
        assert_eq!(crypto.unwrap_count(), 2);
    }

    #[test]
    fn seal_round_trips_under_same_key() {
        let crypto = MockCrypto::new();
        let key = crypto.decrypt_session_key("k1", "", &PeerId::new("bob")).unwrap();

        let sealed = crypto.encrypt(&key, b"hello", [3; NONCE_SIZE]).unwrap();
        assert_ne!(&sealed[NONCE_SIZE..], b"hello");
        assert_eq!(crypto.decrypt(&key, &sealed).unwrap(), b"hello");
    }
}
