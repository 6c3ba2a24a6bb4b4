use core::fmt;

/// A 16-bit function identifier, partitioned into disjoint contiguous
/// ranges. The partition is part of the wire format: changing any boundary
/// changes every compiled script and every structural library hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Opcode(u16);

impl Opcode {
    /// Number of callable parameters `$0 .. $14` visible inside a function
    /// body. Also the maximum arity of any call.
    pub const MAX_PARAMETERS: u8 = 15;

    /// Flag bit distinguishing a bytecode-parameter reference `$$i` from the
    /// plain eval-parameter reference `$i` within the short opcode range.
    pub const BYTECODE_PARAM_FLAG: u8 = 0x10;

    /// First opcode available to short embedded functions. The parameter
    /// block `0..=14` and its flagged twin `16..=30` sit below; bytes 15 and
    /// 31 are never allocated.
    pub const FIRST_SHORT_FUN: u16 = 0x20;

    /// Last opcode encodable in a single byte.
    pub const LAST_SHORT_FUN: u16 = 0x3f;

    /// First opcode of the long embedded range.
    pub const FIRST_LONG_FUN: u16 = 0x40;

    /// Last opcode of the long embedded range.
    pub const LAST_LONG_FUN: u16 = 318;

    /// First opcode of the extended (user) range.
    pub const FIRST_EXTENDED_FUN: u16 = 319;

    /// Last opcode of the extended (user) range.
    pub const LAST_EXTENDED_FUN: u16 = 1022;

    /// Reserved marker: a long call carrying this opcode is followed by one
    /// extra byte selecting a local-library slot.
    pub const LOCAL_LIBRARY_MARKER: u16 = 1023;

    /// First opcode of the local-library slot range. Slots are reachable
    /// only through [`Opcode::LOCAL_LIBRARY_MARKER`].
    pub const FIRST_LOCAL_FUN: u16 = 1024;

    /// Maximum number of functions in one local library.
    pub const MAX_LOCAL_FUNS: usize = 256;

    /// Wraps a raw 16-bit identifier.
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Opcode of the eval-parameter reference `$i`.
    pub const fn eval_param(idx: u8) -> Self {
        Self(idx as u16)
    }

    /// Opcode of the bytecode-parameter reference `$$i`.
    pub const fn bytecode_param(idx: u8) -> Self {
        Self((idx | Self::BYTECODE_PARAM_FLAG) as u16)
    }

    /// The raw 16-bit value.
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    /// Whether the opcode fits the single-byte call encoding.
    pub const fn is_short(self) -> bool {
        self.0 <= Self::LAST_SHORT_FUN
    }

    /// Which range of the partition the opcode falls into.
    pub const fn kind(self) -> OpcodeKind {
        match self.0 {
            c if c < Self::MAX_PARAMETERS as u16 => OpcodeKind::EvalParam(c as u8),
            c if c >= Self::BYTECODE_PARAM_FLAG as u16
                && c < (Self::BYTECODE_PARAM_FLAG + Self::MAX_PARAMETERS) as u16 =>
            {
                OpcodeKind::BytecodeParam((c as u8) & !Self::BYTECODE_PARAM_FLAG)
            }
            c if c <= Self::LAST_SHORT_FUN => OpcodeKind::ShortFun,
            c if c <= Self::LAST_LONG_FUN => OpcodeKind::LongFun,
            c if c <= Self::LAST_EXTENDED_FUN => OpcodeKind::ExtendedFun,
            Self::LOCAL_LIBRARY_MARKER => OpcodeKind::LocalMarker,
            c if c < Self::FIRST_LOCAL_FUN + Self::MAX_LOCAL_FUNS as u16 => {
                OpcodeKind::LocalFun((c - Self::FIRST_LOCAL_FUN) as u8)
            }
            _ => OpcodeKind::Invalid,
        }
    }
}

impl From<u16> for Opcode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<Opcode> for u16 {
    fn from(op: Opcode) -> Self {
        op.0
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Classification of an [`Opcode`] against the range partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpcodeKind {
    /// Parameter reference `$i`; evaluates the caller's argument `i`.
    EvalParam(u8),
    /// Parameter reference `$$i`; yields the *bytecode* of argument `i`.
    BytecodeParam(u8),
    /// Embedded function with a single-byte call encoding.
    ShortFun,
    /// Embedded function with a two-byte call encoding.
    LongFun,
    /// User function compiled from source, two-byte encoding.
    ExtendedFun,
    /// The reserved local-library call marker.
    LocalMarker,
    /// A local-library slot, reachable only through the marker.
    LocalFun(u8),
    /// Outside every defined range.
    Invalid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint_and_contiguous() {
        assert_eq!(Opcode::new(0).kind(), OpcodeKind::EvalParam(0));
        assert_eq!(Opcode::new(14).kind(), OpcodeKind::EvalParam(14));
        assert_eq!(Opcode::new(15).kind(), OpcodeKind::ShortFun);
        assert_eq!(Opcode::new(16).kind(), OpcodeKind::BytecodeParam(0));
        assert_eq!(Opcode::new(30).kind(), OpcodeKind::BytecodeParam(14));
        assert_eq!(Opcode::new(31).kind(), OpcodeKind::ShortFun);
        assert_eq!(Opcode::new(32).kind(), OpcodeKind::ShortFun);
        assert_eq!(Opcode::new(63).kind(), OpcodeKind::ShortFun);
        assert_eq!(Opcode::new(64).kind(), OpcodeKind::LongFun);
        assert_eq!(Opcode::new(318).kind(), OpcodeKind::LongFun);
        assert_eq!(Opcode::new(319).kind(), OpcodeKind::ExtendedFun);
        assert_eq!(Opcode::new(1022).kind(), OpcodeKind::ExtendedFun);
        assert_eq!(Opcode::new(1023).kind(), OpcodeKind::LocalMarker);
        assert_eq!(Opcode::new(1024).kind(), OpcodeKind::LocalFun(0));
        assert_eq!(Opcode::new(1279).kind(), OpcodeKind::LocalFun(255));
        assert_eq!(Opcode::new(1280).kind(), OpcodeKind::Invalid);
    }

    #[test]
    fn param_constructors_match_classification() {
        for i in 0..Opcode::MAX_PARAMETERS {
            assert_eq!(Opcode::eval_param(i).kind(), OpcodeKind::EvalParam(i));
            assert_eq!(Opcode::bytecode_param(i).kind(), OpcodeKind::BytecodeParam(i));
        }
    }
}
