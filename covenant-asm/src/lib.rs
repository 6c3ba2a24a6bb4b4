//! Atomic types of the Covenant expression language: the 16-bit opcode
//! space with its range partition, and the codec for the 1-3 byte call
//! prefixes and inline-data atoms that make up compiled bytecode.
//!
//! This crate is deliberately registry-free. It can tell a call prefix from
//! an inline-data prefix and decode the declared arity of a long call, but
//! it cannot know how many argument atoms follow a *short* call; that
//! information lives in the function registry of `covenant-vm`.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

mod opcode;
mod prefix;

#[cfg(test)]
mod encoding_tests;

pub use opcode::{Opcode, OpcodeKind};
pub use prefix::{data_atom, data_prefix, CallPrefix, PrefixError, RawAtom, MAX_INLINE_DATA_LEN};
