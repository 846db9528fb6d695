//! Cryptographic error types.

use parley_proto::PeerId;
use thiserror::Error;

/// Errors from session key unwrapping and message sealing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Field is not valid base64
    #[error("invalid encoding in {field}: {reason}")]
    InvalidEncoding {
        /// Field being decoded
        field: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Decoded field has the wrong size
    #[error("invalid length for {field}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Field being decoded
        field: &'static str,
        /// Required size
        expected: usize,
        /// Actual size
        actual: usize,
    },

    /// No verifying key is known for the peer
    #[error("no verifying key for peer {peer}")]
    UnknownPeer {
        /// Peer without a registered key
        peer: PeerId,
    },

    /// Session signature did not verify under either party's key
    #[error("session signature from {sender} did not verify")]
    SignatureMismatch {
        /// Claimed sender
        sender: PeerId,
    },

    /// AEAD authentication failed or key derivation failed
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Failure description
        reason: String,
    },

    /// AEAD encryption failed
    #[error("encryption failed")]
    EncryptionFailed,
}
