//! Covenant expression language implementation.
//!
//! A covenant is a pure, bounded computation over byte slices embedded in a
//! transaction output: it receives byte arguments, returns a byte slice,
//! and an empty result means the constraint is violated. Expressions exist
//! in three interchangeable forms — human-readable source, a compact
//! self-describing bytecode, and an executable tree — and this crate
//! carries the whole pipeline between them:
//!
//! * [`library::Library`]: the function registry with opcode allocation
//!   and the structural hash,
//! * the compiler ([`Library::compile_expression`](library::Library)) with
//!   its literal grammar,
//! * the decoder and decompiler,
//! * the evaluator with per-call argument scoping, lazy memoized argument
//!   evaluation, and
//! * the embedded operation set, local libraries and extended-library
//!   upgrades.
//!
//! Bytecode is the canonical transport form: two equal bytecode slices
//! denote equal programs.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod compiler;
pub mod context;
pub mod decompiler;
pub mod error;
pub mod eval;
pub mod expression;
pub mod library;
pub mod local;
pub mod ops;
pub mod tuple;

mod decoder;
mod loader;
mod parser;

// Fully re-export the companion crates.
#[doc(no_inline)]
pub use covenant_asm;
#[doc(no_inline)]
pub use covenant_crypto;

pub mod prelude {
    //! Required types for full functionality.
    #[doc(no_inline)]
    pub use covenant_asm::{CallPrefix, Opcode, OpcodeKind, PrefixError, RawAtom};
    #[doc(no_inline)]
    pub use covenant_crypto::Hasher;

    pub use crate::compiler::CompiledExpression;
    pub use crate::context::{GlobalData, TraceSink, TracingSink};
    pub use crate::decompiler::{compose_one_level, decompile_expression, OneLevel};
    pub use crate::error::{
        CompileError, DecodeError, Error, ExecError, LibraryError, ParseError,
    };
    pub use crate::eval::CallParams;
    pub use crate::expression::{BytecodeRef, Expression};
    pub use crate::library::{Arity, EmbeddedFn, FunDescriptor, Library};
    pub use crate::local::{LocalFn, LocalLibrary};
    pub use crate::ops::{base_embeddings, Embeddings};
    pub use crate::tuple::TupleError;
}
