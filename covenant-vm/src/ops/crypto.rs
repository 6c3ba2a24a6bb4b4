//! Cryptographic operations, delegating to `covenant-crypto`.

use covenant_crypto::{Error as CryptoError, Hasher};

use crate::error::ExecError;
use crate::eval::CallParams;
use crate::ops::TRUE;

pub(super) fn blake2b<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let mut hasher = Hasher::default();
    for n in 0..p.arity() as usize {
        hasher.input(p.arg(n)?);
    }
    Ok(hasher.finalize().to_vec())
}

pub(super) fn valid_signature_ed25519<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let message = p.arg(0)?;
    let signature = p.arg(1)?;
    let pub_key = p.arg(2)?;
    match covenant_crypto::verify(&message, &signature, &pub_key) {
        Ok(()) => Ok(TRUE.to_vec()),
        Err(CryptoError::VerificationFailed) => Ok(Vec::new()),
        // Malformed key or signature shapes are script bugs, not a negative
        // verification result.
        Err(shape) => Err(p.panic(shape.to_string())),
    }
}
