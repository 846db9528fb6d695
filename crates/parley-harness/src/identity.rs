//! Deterministic user key material.

use ed25519_dalek::{SigningKey, VerifyingKey};
use parley_crypto::SealedKeyProvider;
use parley_proto::PeerId;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use x25519_dalek::{PublicKey, StaticSecret};

/// A registered user: X25519 key for session key wrapping and Ed25519 key
/// for signatures.
///
/// The simulated server holds the signing keys, as the real server signs on
/// its users' behalf.
#[derive(Clone)]
pub struct SimIdentity {
    id: PeerId,
    x25519_secret: [u8; 32],
    signing: SigningKey,
}

impl SimIdentity {
    /// Derive key material for `id` from `seed`.
    pub fn from_seed(id: impl Into<PeerId>, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut x25519_secret = [0u8; 32];
        rng.fill_bytes(&mut x25519_secret);
        let mut signing_seed = [0u8; 32];
        rng.fill_bytes(&mut signing_seed);

        Self { id: id.into(), x25519_secret, signing: SigningKey::from_bytes(&signing_seed) }
    }

    /// User id.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// X25519 public key session keys are wrapped for.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from(&StaticSecret::from(self.x25519_secret))
    }

    /// Ed25519 signing key.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing
    }

    /// Ed25519 verifying key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Crypto provider for this user that trusts `peers`.
    pub fn provider<'a>(&self, peers: impl IntoIterator<Item = &'a SimIdentity>) -> SealedKeyProvider {
        let mut provider =
            SealedKeyProvider::new(self.id.clone(), self.x25519_secret, self.verifying_key());
        for peer in peers {
            provider.add_peer(peer.id.clone(), peer.verifying_key());
        }
        provider
    }
}

impl std::fmt::Debug for SimIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimIdentity").field("id", &self.id).finish_non_exhaustive()
    }
}
