//! Error surfaces of the language core.
//!
//! Two distinct surfaces exist. *Construction* errors (parsing, compilation,
//! decoding, registry manipulation) are plain values returned from the
//! failing call. *Evaluation* errors are the language's panics: an
//! [`ExecError`] unwinds the whole top-level evaluation through `?` and is
//! re-raised as a host panic only by the `must_*` wrappers.

use covenant_asm::PrefixError;

use crate::tuple::TupleError;

use thiserror::Error;

/// Source-text parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// An expression was expected and the input ended instead.
    #[error("expected an expression, found end of input")]
    UnexpectedEnd,
    /// An expression was expected and a delimiter was found instead.
    #[error("expected an expression, found `{0}`")]
    UnexpectedChar(char),
    /// A parenthesized argument list was not closed.
    #[error("unbalanced parentheses in expression")]
    UnbalancedParentheses,
    /// Input remained after a complete top-level expression.
    #[error("unexpected input after expression: `{0}`")]
    TrailingInput(String),
    /// A definition block does not match `func NAME : BODY`.
    #[error("malformed definition, expected `func NAME : BODY`: `{0}`")]
    MalformedDefinition(String),
}

/// Errors of the source-to-bytecode compiler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The source text did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A symbol resolves neither as a literal nor in any registry.
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
    /// A definition batch binds the same name twice.
    #[error("duplicate definition of `{0}`")]
    DuplicateSymbol(String),
    /// A call does not match the declared arity of its target.
    #[error("wrong number of arguments in call to `{sym}`: expected {expected}, got {got}")]
    ArityMismatch {
        /// Symbol of the called function.
        sym: String,
        /// Declared arity, `"vararg"` for variable.
        expected: String,
        /// Arguments written at the call site.
        got: usize,
    },
    /// More arguments than any call can carry.
    #[error("call to `{sym}` has {got} arguments, the maximum is 15")]
    TooManyArguments {
        /// Symbol of the called function.
        sym: String,
        /// Arguments written at the call site.
        got: usize,
    },
    /// A numeric literal outside the range of its form.
    #[error("literal out of range: `{0}`")]
    LiteralRange(String),
    /// A hex literal with invalid or odd-length digits.
    #[error("invalid hex literal: `{0}`")]
    BadHexLiteral(String),
    /// Inline data beyond the 127-byte limit of the data prefix.
    #[error("inline data of {0} bytes exceeds the 127-byte limit")]
    DataTooLong(usize),
    /// A `$i` / `$$i` reference outside `0..15`.
    #[error("invalid parameter reference `{0}`")]
    ParamIndex(String),
    /// `#NAME` where `NAME` is variadic: no single call prefix exists.
    #[error("`#{0}`: a vararg function has no canonical call prefix")]
    VarargPrefix(String),
    /// Byte-level encoding failure.
    #[error(transparent)]
    Prefix(#[from] PrefixError),
}

/// Errors of the bytecode-to-tree decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Byte-level prefix failure (truncation included).
    #[error(transparent)]
    Prefix(#[from] PrefixError),
    /// Bytes remained after the top-level atom.
    #[error("trailing bytes after the top-level expression at offset {0}")]
    TrailingBytes(usize),
    /// The opcode is not allocated in the library.
    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),
    /// The declared arity contradicts the registry.
    #[error("wrong arity in call to `{sym}`: declared {got}, registry says {expected}")]
    ArityMismatch {
        /// Symbol of the called function.
        sym: String,
        /// Arity recorded in the registry.
        expected: u8,
        /// Arity declared in the call prefix.
        got: u8,
    },
    /// A local-library call was found but no local library was provided.
    #[error("local-library call without a local library")]
    NoLocalLibrary,
    /// A local slot index beyond the provided library.
    #[error("local-library slot {slot} out of range, library has {len} functions")]
    LocalSlotOutOfRange {
        /// Requested slot.
        slot: u8,
        /// Functions in the provided library.
        len: usize,
    },
    /// A blob sequence longer than the slot range.
    #[error("local library with {0} functions exceeds the 256-slot range")]
    LocalLibraryTooLarge(usize),
    /// Malformed tuple container.
    #[error(transparent)]
    Tuple(#[from] TupleError),
}

/// Errors of library construction and manipulation. Every mutating call is
/// atomic: on error the library is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LibraryError {
    /// The symbol is already bound.
    #[error("duplicate symbol `{0}`")]
    DuplicateSymbol(String),
    /// An opcode range has no free slot left.
    #[error("the {0} opcode range is full")]
    RangeFull(&'static str),
    /// Arity outside what the descriptor kind allows.
    #[error("illegal arity for `{sym}`: {reason}")]
    BadArity {
        /// Symbol being registered.
        sym: String,
        /// Which constraint was violated.
        reason: String,
    },
    /// The symbol is not bound.
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
    /// A replacement targeted a descriptor of the wrong kind.
    #[error("`{sym}` is not an {expected} function")]
    WrongKind {
        /// Symbol being replaced.
        sym: String,
        /// `"embedded"` or `"extended"`.
        expected: &'static str,
    },
    /// Arity mismatch in `call_prefix`.
    #[error("call prefix of `{sym}`: declared arity is {expected}, requested {got}")]
    ArityMismatch {
        /// Symbol being encoded.
        sym: String,
        /// Declared arity, `"vararg"` for variable.
        expected: String,
        /// Requested call arity.
        got: u8,
    },
    /// Compilation of an extended function body failed.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Decoding of a stored body failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Byte-level encoding failure.
    #[error(transparent)]
    Prefix(#[from] PrefixError),
    /// A loader record references an embedded symbol the host did not supply.
    #[error("no embedded implementation supplied for `{0}`")]
    MissingEmbedding(String),
    /// A compiled-mode descriptor file does not hash to its recorded value.
    #[error("library hash mismatch: file says {recorded}, computed {computed}")]
    HashMismatch {
        /// Hash recorded in the file.
        recorded: String,
        /// Hash recomputed from the reconstructed library.
        computed: String,
    },
    /// An internally inconsistent descriptor-file record.
    #[error("bad descriptor record for `{sym}`: {reason}")]
    BadRecord {
        /// Symbol of the offending record.
        sym: String,
        /// Which consistency check failed.
        reason: String,
    },
    /// YAML (de)serialization failure.
    #[error("descriptor file error: {0}")]
    Yaml(String),
}

/// An evaluation panic. Aborts the entire top-level evaluation; there is no
/// partial success.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// Explicit or built-in panic with its formatted message.
    #[error("{0}")]
    Panic(String),
    /// A decoder error surfaced during reflective evaluation or a local
    /// call.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ExecError {
    /// The panic message, when this is a plain panic.
    pub fn panic_message(&self) -> Option<&str> {
        match self {
            Self::Panic(msg) => Some(msg),
            Self::Decode(_) => None,
        }
    }
}

/// Umbrella error of the combined entry points (`eval_from_source` and
/// friends), converting from every layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Compilation failed.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Decoding failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Library construction or lookup failed.
    #[error(transparent)]
    Library(#[from] LibraryError),
    /// Evaluation panicked.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Compile(e.into())
    }
}
