//! X25519 key wrapping with Ed25519 session signatures.
//!
//! All functions are pure - ephemeral secrets and nonces are provided by the
//! caller.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hkdf::Hkdf;
use parley_proto::PeerId;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoProvider, NONCE_SIZE, SESSION_KEY_SIZE, SessionKey};

/// HKDF info string for the key-encryption key (domain separation).
const WRAP_INFO: &[u8] = b"parley session key wrap v1";

/// X25519 public key size.
const PUBLIC_KEY_SIZE: usize = 32;

/// Poly1305 tag size.
const TAG_SIZE: usize = 16;

/// Size of a decoded `encrypted_aes_key`.
const WRAPPED_KEY_SIZE: usize = PUBLIC_KEY_SIZE + NONCE_SIZE + SESSION_KEY_SIZE + TAG_SIZE;

/// Ed25519 signature size.
const SIGNATURE_SIZE: usize = 64;

/// Metadata string signed by the session initiator.
pub fn session_metadata(initiator: &PeerId, responder: &PeerId) -> String {
    format!("{initiator}:{responder}")
}

/// Sign the session metadata as `initiator`. Returns base64.
pub fn sign_session(signing_key: &SigningKey, initiator: &PeerId, responder: &PeerId) -> String {
    let signature = signing_key.sign(session_metadata(initiator, responder).as_bytes());
    STANDARD.encode(signature.to_bytes())
}

/// Wrap `session_key` for `recipient`. Returns base64
/// `ephemeral_public || nonce || ciphertext`.
///
/// # Errors
///
/// - `EncryptionFailed` if the AEAD rejects its input
pub fn seal_session_key(
    recipient: &PublicKey,
    session_key: &SessionKey,
    ephemeral_secret: [u8; 32],
    nonce: [u8; NONCE_SIZE],
) -> Result<String, CryptoError> {
    let ephemeral = StaticSecret::from(ephemeral_secret);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);
    let kek = derive_kek(shared.as_bytes())?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(kek.as_slice()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), session_key.as_bytes().as_slice())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut wrapped = Vec::with_capacity(WRAPPED_KEY_SIZE);
    wrapped.extend_from_slice(ephemeral_public.as_bytes());
    wrapped.extend_from_slice(&nonce);
    wrapped.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(wrapped))
}

fn derive_kek(shared_secret: &[u8]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
    let mut kek = Zeroizing::new([0u8; 32]);
    hkdf.expand(WRAP_INFO, kek.as_mut_slice())
        .map_err(|e| CryptoError::DecryptionFailed { reason: e.to_string() })?;
    Ok(kek)
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, CryptoError> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::InvalidEncoding { field, reason: e.to_string() })
}

/// Production [`CryptoProvider`].
///
/// Holds the local user's static X25519 secret (to unwrap session keys) and
/// a directory of Ed25519 verifying keys (to authenticate key exchanges).
pub struct SealedKeyProvider {
    local: PeerId,
    secret: StaticSecret,
    verifying_keys: HashMap<PeerId, VerifyingKey>,
}

impl SealedKeyProvider {
    /// Create a provider for `local` with its X25519 secret and Ed25519
    /// verifying key.
    pub fn new(local: PeerId, secret: [u8; 32], local_verifying_key: VerifyingKey) -> Self {
        let mut verifying_keys = HashMap::new();
        verifying_keys.insert(local.clone(), local_verifying_key);
        Self { local, secret: StaticSecret::from(secret), verifying_keys }
    }

    /// Register a peer's Ed25519 verifying key.
    pub fn add_peer(&mut self, peer: PeerId, verifying_key: VerifyingKey) {
        self.verifying_keys.insert(peer, verifying_key);
    }

    /// The local user's X25519 public key, for publishing to issuers.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(&self.secret)
    }

    /// Verify the session signature.
    ///
    /// Either party may have initiated: accept the sender's signature over
    /// `"{sender}:{local}"` or our own over `"{local}:{sender}"`.
    fn verify_session(&self, signature: &str, sender: &PeerId) -> Result<(), CryptoError> {
        let bytes = decode_field("signature", signature)?;
        let bytes: [u8; SIGNATURE_SIZE] =
            bytes.as_slice().try_into().map_err(|_| CryptoError::InvalidLength {
                field: "signature",
                expected: SIGNATURE_SIZE,
                actual: bytes.len(),
            })?;
        let signature = Signature::from_bytes(&bytes);

        let sender_key = self
            .verifying_keys
            .get(sender)
            .ok_or_else(|| CryptoError::UnknownPeer { peer: sender.clone() })?;

        let by_sender = session_metadata(sender, &self.local);
        if sender_key.verify(by_sender.as_bytes(), &signature).is_ok() {
            return Ok(());
        }

        let by_local = session_metadata(&self.local, sender);
        let accepted = self
            .verifying_keys
            .get(&self.local)
            .is_some_and(|key| key.verify(by_local.as_bytes(), &signature).is_ok());

        if accepted { Ok(()) } else { Err(CryptoError::SignatureMismatch { sender: sender.clone() }) }
    }
}

impl CryptoProvider for SealedKeyProvider {
    fn decrypt_session_key(
        &self,
        encrypted_key: &str,
        signature: &str,
        sender: &PeerId,
    ) -> Result<SessionKey, CryptoError> {
        self.verify_session(signature, sender)?;

        let wrapped = decode_field("encrypted_aes_key", encrypted_key)?;
        if wrapped.len() != WRAPPED_KEY_SIZE {
            return Err(CryptoError::InvalidLength {
                field: "encrypted_aes_key",
                expected: WRAPPED_KEY_SIZE,
                actual: wrapped.len(),
            });
        }

        let (public, rest) = wrapped.split_at(PUBLIC_KEY_SIZE);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

        let mut ephemeral_public = [0u8; PUBLIC_KEY_SIZE];
        ephemeral_public.copy_from_slice(public);
        let shared = self.secret.diffie_hellman(&PublicKey::from(ephemeral_public));
        let kek = derive_kek(shared.as_bytes())?;

        let cipher = XChaCha20Poly1305::new(Key::from_slice(kek.as_slice()));
        let plaintext = Zeroizing::new(
            cipher.decrypt(XNonce::from_slice(nonce), ciphertext).map_err(|_| {
                CryptoError::DecryptionFailed { reason: "authentication failed".to_string() }
            })?,
        );

        let bytes: [u8; SESSION_KEY_SIZE] =
            plaintext.as_slice().try_into().map_err(|_| CryptoError::InvalidLength {
                field: "session key",
                expected: SESSION_KEY_SIZE,
                actual: plaintext.len(),
            })?;
        Ok(SessionKey::from_bytes(bytes))
    }

    fn encrypt(
        &self,
        key: &SessionKey,
        plaintext: &[u8],
        nonce: [u8; NONCE_SIZE],
    ) -> Result<Vec<u8>, CryptoError> {
        seal_message(key, plaintext, nonce)
    }

    fn decrypt(&self, key: &SessionKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        open_message(key, sealed)
    }
}

/// Seal a message body under `key`. Returns `nonce || ciphertext`.
///
/// # Errors
///
/// - `EncryptionFailed` if the AEAD rejects its input
pub fn seal_message(
    key: &SessionKey,
    plaintext: &[u8],
    nonce: [u8; NONCE_SIZE],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Open a body produced by [`seal_message`].
///
/// # Errors
///
/// - `InvalidLength` if the input is shorter than a nonce and a tag
/// - `DecryptionFailed` if authentication fails
pub fn open_message(key: &SessionKey, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::InvalidLength {
            field: "sealed message",
            expected: NONCE_SIZE + TAG_SIZE,
            actual: sealed.len(),
        });
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed { reason: "authentication failed".to_string() })
}
