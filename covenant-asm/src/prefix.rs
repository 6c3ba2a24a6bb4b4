use crate::opcode::{Opcode, OpcodeKind};

use thiserror::Error;

/// Bit 7 of the first atom byte: inline data follows.
const DATA_FLAG: u8 = 0x80;

/// Bit 6 of the first atom byte: two-byte (long) call encoding.
const LONG_FLAG: u8 = 0x40;

/// Widest payload an inline-data atom can carry; the prefix byte reserves
/// seven bits for the length.
pub const MAX_INLINE_DATA_LEN: usize = 0x7f;

/// Errors of the byte-level atom codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PrefixError {
    /// The input ended inside an atom prefix or inline payload.
    #[error("bytecode ends inside an atom prefix or inline payload")]
    UnexpectedEnd,
    /// Inline data longer than the 7-bit length field allows.
    #[error("inline data of {0} bytes does not fit the 7-bit length field")]
    DataTooLong(usize),
    /// Call arity beyond the 4-bit field of the long encoding.
    #[error("call arity {0} exceeds the maximum of 15")]
    ArityTooLarge(u8),
    /// The opcode does not belong to the range the requested encoding covers.
    #[error("opcode {0} is not encodable in the requested form")]
    OpcodeRange(Opcode),
}

/// The first atom of a bytecode stream, decoded one level deep.
///
/// Argument atoms of a call are *not* consumed: a long call declares its
/// arity in the prefix, but a short call's arity is registry knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAtom<'a> {
    /// Inline data; the slice is the payload without its prefix byte.
    Data(&'a [u8]),
    /// Single-byte call: the byte is the opcode, arity comes from the
    /// registry (zero for parameter references).
    ShortCall(Opcode),
    /// Two-byte call with the declared arity of this call site.
    LongCall {
        /// Opcode recovered from the low ten bits.
        opcode: Opcode,
        /// Arity declared in bits 13..10.
        arity: u8,
    },
    /// Long call carrying the local-library marker plus one slot byte.
    LocalCall {
        /// Local-library slot index.
        slot: u8,
        /// Arity declared in the marker prefix.
        arity: u8,
    },
}

impl<'a> RawAtom<'a> {
    /// Decodes the first atom of `code`. Returns the atom together with the
    /// number of bytes it occupies (prefix plus payload for inline data;
    /// prefix only for calls).
    pub fn parse(code: &'a [u8]) -> Result<(Self, usize), PrefixError> {
        let first = *code.first().ok_or(PrefixError::UnexpectedEnd)?;

        if first & DATA_FLAG != 0 {
            let len = (first & MAX_INLINE_DATA_LEN as u8) as usize;
            let payload = code.get(1..1 + len).ok_or(PrefixError::UnexpectedEnd)?;
            return Ok((Self::Data(payload), 1 + len));
        }

        if first & LONG_FLAG == 0 {
            return Ok((Self::ShortCall(Opcode::new(first as u16)), 1));
        }

        let second = *code.get(1).ok_or(PrefixError::UnexpectedEnd)?;
        let word = u16::from_be_bytes([first, second]);
        let arity = ((word >> 10) & 0x0f) as u8;
        let opcode = Opcode::new(word & 0x03ff);

        if opcode.to_u16() == Opcode::LOCAL_LIBRARY_MARKER {
            let slot = *code.get(2).ok_or(PrefixError::UnexpectedEnd)?;
            return Ok((Self::LocalCall { slot, arity }, 3));
        }

        Ok((Self::LongCall { opcode, arity }, 2))
    }

    /// Length of the atom's prefix in bytes: 1 for inline data and short
    /// calls, 2 for long calls, 3 for local calls.
    pub const fn prefix_len(&self) -> usize {
        match self {
            Self::Data(_) | Self::ShortCall(_) => 1,
            Self::LongCall { .. } => 2,
            Self::LocalCall { .. } => 3,
        }
    }
}

/// An encoded call prefix: the 1, 2, or 3 bytes identifying the operation
/// and the declared arity of a call atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallPrefix {
    bytes: [u8; 3],
    len: u8,
}

impl CallPrefix {
    /// Single-byte prefix of a short call (parameter references included).
    pub fn short(opcode: Opcode) -> Result<Self, PrefixError> {
        if !opcode.is_short() {
            return Err(PrefixError::OpcodeRange(opcode));
        }
        Ok(Self {
            bytes: [opcode.to_u16() as u8, 0, 0],
            len: 1,
        })
    }

    /// Two-byte prefix of a long or extended call with explicit arity.
    pub fn long(opcode: Opcode, arity: u8) -> Result<Self, PrefixError> {
        if arity > Opcode::MAX_PARAMETERS {
            return Err(PrefixError::ArityTooLarge(arity));
        }
        match opcode.kind() {
            OpcodeKind::LongFun | OpcodeKind::ExtendedFun => (),
            _ => return Err(PrefixError::OpcodeRange(opcode)),
        }
        let word = 0x4000 | (u16::from(arity) << 10) | opcode.to_u16();
        let [hi, lo] = word.to_be_bytes();
        Ok(Self {
            bytes: [hi, lo, 0],
            len: 2,
        })
    }

    /// Three-byte prefix of a local-library call: marker, then slot index.
    pub fn local(slot: u8, arity: u8) -> Result<Self, PrefixError> {
        if arity > Opcode::MAX_PARAMETERS {
            return Err(PrefixError::ArityTooLarge(arity));
        }
        let word = 0x4000 | (u16::from(arity) << 10) | Opcode::LOCAL_LIBRARY_MARKER;
        let [hi, lo] = word.to_be_bytes();
        Ok(Self {
            bytes: [hi, lo, slot],
            len: 3,
        })
    }

    /// The encoded bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// The encoded bytes as an owned vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl AsRef<[u8]> for CallPrefix {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Prefix byte of an inline-data atom carrying `len` payload bytes.
pub fn data_prefix(len: usize) -> Result<u8, PrefixError> {
    if len > MAX_INLINE_DATA_LEN {
        return Err(PrefixError::DataTooLong(len));
    }
    Ok(DATA_FLAG | len as u8)
}

/// Encodes a byte slice as a self-contained inline-data atom.
pub fn data_atom(payload: &[u8]) -> Result<Vec<u8>, PrefixError> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(data_prefix(payload.len())?);
    out.extend_from_slice(payload);
    Ok(out)
}
