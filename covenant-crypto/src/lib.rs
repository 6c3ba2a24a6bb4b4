//! Cryptographic primitives plugged into the Covenant expression language:
//! Ed25519 signature verification and the Blake2b-256 hasher used both by
//! the `blake2b` operation and by the structural library hash.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod ed25519;
mod error;
mod hasher;

pub use ed25519::verify;
pub use error::Error;
pub use hasher::Hasher;
