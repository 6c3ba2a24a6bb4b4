//! Ed25519 signature verification

use ed25519_dalek::{Signature, VerifyingKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

use crate::Error;

/// Verify a signature against a message and a public key.
///
/// The key must be exactly 32 bytes and a valid curve point, the signature
/// exactly 64 bytes; shape violations are reported as distinct errors so
/// callers can surface them separately from a plain verification failure.
pub fn verify(message: &[u8], signature: &[u8], pub_key: &[u8]) -> Result<(), Error> {
    let signature: [u8; SIGNATURE_LENGTH] =
        signature.try_into().map_err(|_| Error::InvalidSignature)?;
    let signature = Signature::from_bytes(&signature);

    let pub_key: [u8; PUBLIC_KEY_LENGTH] =
        pub_key.try_into().map_err(|_| Error::InvalidPublicKey)?;
    let pub_key = VerifyingKey::from_bytes(&pub_key).map_err(|_| Error::InvalidPublicKey)?;

    if pub_key.verify_strict(message, &signature).is_ok() {
        Ok(())
    } else {
        Err(Error::VerificationFailed)
    }
}
