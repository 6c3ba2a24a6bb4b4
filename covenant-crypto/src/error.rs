use thiserror::Error;

/// Crypto error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Error {
    /// The public key bytes are not a valid Ed25519 point.
    #[error("invalid ed25519 public key")]
    InvalidPublicKey,

    /// The signature is not 64 bytes long.
    #[error("invalid ed25519 signature shape")]
    InvalidSignature,

    /// The signature does not verify against the message and key.
    #[error("ed25519 signature verification failed")]
    VerificationFailed,
}
