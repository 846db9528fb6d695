//! Local key material and trusted peer keys.
//!
//! The CLI derives its X25519 and Ed25519 keys from a user-supplied seed, so
//! the same seed always yields the same identity. Peers are trusted by
//! passing their Ed25519 verifying key as `name=base64`.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use ed25519_dalek::{SigningKey, VerifyingKey};
use parley_crypto::SealedKeyProvider;
use parley_proto::PeerId;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// Key derivation labels.
const X25519_LABEL: &[u8] = b"parley cli x25519 v1";
const ED25519_LABEL: &[u8] = b"parley cli ed25519 v1";

/// Keys of the local user.
pub struct LocalIdentity {
    user: PeerId,
    x25519_secret: Zeroizing<[u8; 32]>,
    signing: SigningKey,
}

impl LocalIdentity {
    /// Derive the identity of `user` from `seed`.
    pub fn from_seed(user: PeerId, seed: &str) -> Self {
        let x25519_secret = Zeroizing::new(derive(X25519_LABEL, &user, seed));
        let signing_seed = Zeroizing::new(derive(ED25519_LABEL, &user, seed));
        Self { user, x25519_secret, signing: SigningKey::from_bytes(&signing_seed) }
    }

    /// The user these keys belong to.
    pub fn user(&self) -> &PeerId {
        &self.user
    }

    /// X25519 public key, base64. Session keys are wrapped for this key.
    pub fn public_key(&self) -> String {
        STANDARD.encode(PublicKey::from(&StaticSecret::from(*self.x25519_secret)).as_bytes())
    }

    /// Ed25519 verifying key, base64. Peers pass this to `--peer-key`.
    pub fn verifying_key(&self) -> String {
        STANDARD.encode(self.signing.verifying_key().as_bytes())
    }

    /// Crypto provider trusting `peers`.
    pub fn provider(&self, peers: impl IntoIterator<Item = PeerKey>) -> SealedKeyProvider {
        let mut provider = SealedKeyProvider::new(
            self.user.clone(),
            *self.x25519_secret,
            self.signing.verifying_key(),
        );
        for peer in peers {
            provider.add_peer(peer.peer, peer.key);
        }
        provider
    }
}

fn derive(label: &[u8], user: &PeerId, seed: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(label);
    hasher.update(user.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(seed.as_bytes());
    hasher.finalize().into()
}

/// A trusted peer's Ed25519 verifying key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerKey {
    /// Peer the key belongs to.
    pub peer: PeerId,
    /// Ed25519 verifying key.
    pub key: VerifyingKey,
}

/// Parse `name=base64` into a [`PeerKey`].
///
/// # Errors
///
/// A message suitable for the command line if the format, the base64, or
/// the key itself is invalid.
pub fn parse_peer_key(arg: &str) -> Result<PeerKey, String> {
    let (name, encoded) =
        arg.split_once('=').ok_or_else(|| format!("expected name=base64, got {arg:?}"))?;
    if name.is_empty() {
        return Err("peer name is empty".to_string());
    }

    let bytes = STANDARD.decode(encoded).map_err(|e| format!("invalid base64 for {name}: {e}"))?;
    let bytes: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| format!("key for {name} must be 32 bytes, got {}", bytes.len()))?;
    let key = VerifyingKey::from_bytes(&bytes).map_err(|e| format!("invalid key for {name}: {e}"))?;

    Ok(PeerKey { peer: PeerId::new(name), key })
}
