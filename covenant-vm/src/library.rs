//! The function registry: symbol ↔ opcode ↔ descriptor maps with disjoint
//! range allocation and the structural library hash.
//!
//! A [`Library`] is conceptually read-only once populated: evaluations take
//! a shared reference, and none of the mutating calls
//! ([`Library::embed_short`], [`Library::extend`], the `replace_*` family)
//! may run concurrently with them. Every mutating call is atomic: on error
//! the registry is unchanged.

use std::collections::HashMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use covenant_asm::{CallPrefix, Opcode, OpcodeKind};
use covenant_crypto::Hasher;

use crate::compiler;
use crate::decoder;
use crate::error::LibraryError;
use crate::eval::CallParams;
use crate::error::ExecError;
use crate::expression::Expression;
use crate::parser;

/// Native implementation of an embedded function.
pub type EmbeddedFn<T> = fn(&mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError>;

/// Declared arity of a function: a fixed argument count or variadic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// Exactly this many arguments.
    Fixed(u8),
    /// Any number of arguments up to the 15-argument call limit.
    Vararg,
}

impl Arity {
    /// Whether a call with `n` arguments matches this declaration.
    pub fn accepts(self, n: u8) -> bool {
        match self {
            Self::Fixed(k) => k == n,
            Self::Vararg => n <= Opcode::MAX_PARAMETERS,
        }
    }

    /// The fixed argument count, if any.
    pub fn fixed(self) -> Option<u8> {
        match self {
            Self::Fixed(k) => Some(k),
            Self::Vararg => None,
        }
    }

    /// Byte used in the structural hash and the descriptor file.
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            Self::Fixed(k) => k,
            Self::Vararg => 0xff,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(k) => write!(f, "{k}"),
            Self::Vararg => write!(f, "vararg"),
        }
    }
}

/// How a function is executed.
pub(crate) enum FunImpl<T> {
    /// Native routine supplied by the host or the base set.
    Embedded(EmbeddedFn<T>),
    /// Compiled body of an extended function, evaluated in a fresh scope
    /// built from the caller's arguments.
    Expression(Arc<Expression>),
    /// `$i`: evaluate entry `i` of the current variable scope.
    EvalParam(u8),
    /// `$$i`: the bytecode of entry `i` of the current variable scope.
    BytecodeParam(u8),
}

impl<T> Clone for FunImpl<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Embedded(f) => Self::Embedded(*f),
            Self::Expression(e) => Self::Expression(e.clone()),
            Self::EvalParam(i) => Self::EvalParam(*i),
            Self::BytecodeParam(i) => Self::BytecodeParam(*i),
        }
    }
}

impl<T> fmt::Debug for FunImpl<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded(_) => write!(f, "Embedded(..)"),
            Self::Expression(_) => write!(f, "Expression(..)"),
            Self::EvalParam(i) => write!(f, "EvalParam({i})"),
            Self::BytecodeParam(i) => write!(f, "BytecodeParam({i})"),
        }
    }
}

/// One registry entry.
#[derive(Debug)]
pub struct FunDescriptor<T> {
    pub(crate) sym: Arc<str>,
    pub(crate) opcode: Opcode,
    pub(crate) arity: Arity,
    pub(crate) bytecode: Option<Vec<u8>>,
    pub(crate) source: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) fun: FunImpl<T>,
}

// Not derived: `T` itself is never cloned, only referenced.
impl<T> Clone for FunDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            sym: self.sym.clone(),
            opcode: self.opcode,
            arity: self.arity,
            bytecode: self.bytecode.clone(),
            source: self.source.clone(),
            description: self.description.clone(),
            fun: self.fun.clone(),
        }
    }
}

impl<T> FunDescriptor<T> {
    /// The function's symbol.
    pub fn sym(&self) -> &str {
        &self.sym
    }

    /// The allocated opcode.
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Declared arity.
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Compiled body bytecode; present only for extended functions.
    pub fn bytecode(&self) -> Option<&[u8]> {
        self.bytecode.as_deref()
    }

    /// Source text the body was compiled from, when retained.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Free-form description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether the implementation is native (parameter references count as
    /// embedded pseudo-functions).
    pub fn is_embedded(&self) -> bool {
        !matches!(self.fun, FunImpl::Expression(_))
    }

    /// Whether this entry is an extended function compiled from source.
    pub fn is_extended(&self) -> bool {
        matches!(self.fun, FunImpl::Expression(_))
    }

    /// Whether the opcode fits the single-byte call encoding.
    pub fn is_short(&self) -> bool {
        self.opcode.is_short()
    }

    pub(crate) fn fun(&self) -> &FunImpl<T> {
        &self.fun
    }
}

/// The function registry together with everything derived from it: opcode
/// allocation, call-prefix emission and the structural hash. The host data
/// type `T` is opaque to the core and only ever touched by embedded
/// implementations.
#[derive(Debug)]
pub struct Library<T = ()> {
    by_sym: HashMap<String, Opcode>,
    by_code: BTreeMap<u16, FunDescriptor<T>>,
}

impl<T> Clone for Library<T> {
    fn clone(&self) -> Self {
        Self {
            by_sym: self.by_sym.clone(),
            by_code: self.by_code.clone(),
        }
    }
}

impl<T> Library<T> {
    /// A registry with no entries at all. Only the descriptor-file loader
    /// starts here; everything else goes through [`Library::new`].
    pub(crate) fn bare() -> Self {
        Self {
            by_sym: HashMap::new(),
            by_code: BTreeMap::new(),
        }
    }

    /// An empty registry holding only the parameter pseudo-functions
    /// `$0..$14` and `$$0..$$14`.
    pub fn new() -> Self {
        let mut lib = Self::bare();
        for i in 0..Opcode::MAX_PARAMETERS {
            lib.insert(FunDescriptor {
                sym: Arc::from(format!("${i}")),
                opcode: Opcode::eval_param(i),
                arity: Arity::Fixed(0),
                bytecode: None,
                source: None,
                description: None,
                fun: FunImpl::EvalParam(i),
            })
            .expect("parameter block is free in an empty registry");
            lib.insert(FunDescriptor {
                sym: Arc::from(format!("$${i}")),
                opcode: Opcode::bytecode_param(i),
                arity: Arity::Fixed(0),
                bytecode: None,
                source: None,
                description: None,
                fun: FunImpl::BytecodeParam(i),
            })
            .expect("parameter block is free in an empty registry");
        }
        lib
    }

    /// The base library: parameter pseudo-functions plus the embedded
    /// operation set.
    pub fn base() -> Self {
        let mut lib = Self::new();
        crate::ops::register(&mut lib).expect("base operation set registers cleanly");
        lib
    }

    pub(crate) fn insert(&mut self, desc: FunDescriptor<T>) -> Result<Opcode, LibraryError> {
        if self.by_sym.contains_key(desc.sym.as_ref()) {
            return Err(LibraryError::DuplicateSymbol(desc.sym.to_string()));
        }
        let opcode = desc.opcode;
        debug_assert!(!self.by_code.contains_key(&opcode.to_u16()));
        self.by_sym.insert(desc.sym.to_string(), opcode);
        self.by_code.insert(opcode.to_u16(), desc);
        Ok(opcode)
    }

    fn next_free(&self, first: u16, last: u16, what: &'static str) -> Result<Opcode, LibraryError> {
        let next = self
            .by_code
            .range(first..=last)
            .next_back()
            .map_or(first, |(code, _)| code + 1);
        if next > last {
            return Err(LibraryError::RangeFull(what));
        }
        Ok(Opcode::new(next))
    }

    /// Registers an embedded function in the single-byte opcode range.
    /// Short functions must have a fixed arity.
    pub fn embed_short(
        &mut self,
        sym: &str,
        arity: u8,
        fun: EmbeddedFn<T>,
        description: Option<&str>,
    ) -> Result<Opcode, LibraryError> {
        if arity > Opcode::MAX_PARAMETERS {
            return Err(LibraryError::BadArity {
                sym: sym.to_string(),
                reason: format!("{arity} exceeds the maximum of 15"),
            });
        }
        let opcode = self.next_free(
            Opcode::FIRST_SHORT_FUN,
            Opcode::LAST_SHORT_FUN,
            "short embedded",
        )?;
        self.insert(FunDescriptor {
            sym: Arc::from(sym),
            opcode,
            arity: Arity::Fixed(arity),
            bytecode: None,
            source: None,
            description: description.map(str::to_string),
            fun: FunImpl::Embedded(fun),
        })
    }

    /// Registers an embedded function in the two-byte opcode range; the
    /// arity may be variadic.
    pub fn embed_long(
        &mut self,
        sym: &str,
        arity: Arity,
        fun: EmbeddedFn<T>,
        description: Option<&str>,
    ) -> Result<Opcode, LibraryError> {
        if let Arity::Fixed(k) = arity {
            if k > Opcode::MAX_PARAMETERS {
                return Err(LibraryError::BadArity {
                    sym: sym.to_string(),
                    reason: format!("{k} exceeds the maximum of 15"),
                });
            }
        }
        let opcode = self.next_free(
            Opcode::FIRST_LONG_FUN,
            Opcode::LAST_LONG_FUN,
            "long embedded",
        )?;
        self.insert(FunDescriptor {
            sym: Arc::from(sym),
            opcode,
            arity,
            bytecode: None,
            source: None,
            description: description.map(str::to_string),
            fun: FunImpl::Embedded(fun),
        })
    }

    /// Compiles `source` and registers it as an extended function. The
    /// arity is the highest parameter index referenced by the body plus
    /// one.
    pub fn extend(
        &mut self,
        sym: &str,
        source: &str,
        description: Option<&str>,
    ) -> Result<Opcode, LibraryError> {
        if self.by_sym.contains_key(sym) {
            return Err(LibraryError::DuplicateSymbol(sym.to_string()));
        }
        let compiled = compiler::compile_with_local(self, None, source)?;
        let (body, num_params) = decoder::decode_with_local(self, None, &compiled.bytecode)?;
        debug_assert_eq!(num_params, compiled.num_params);

        let opcode = self.next_free(
            Opcode::FIRST_EXTENDED_FUN,
            Opcode::LAST_EXTENDED_FUN,
            "extended",
        )?;
        self.insert(FunDescriptor {
            sym: Arc::from(sym),
            opcode,
            arity: Arity::Fixed(num_params),
            bytecode: Some(compiled.bytecode),
            source: Some(source.to_string()),
            description: description.map(str::to_string),
            fun: FunImpl::Expression(Arc::new(body)),
        })
    }

    /// Processes a `func NAME : BODY` batch through [`Library::extend`] in
    /// order. Atomic: on any error the library is left unchanged.
    pub fn extend_many(&mut self, source: &str) -> Result<Vec<Opcode>, LibraryError> {
        let definitions =
            parser::parse_definitions(source).map_err(crate::error::CompileError::from)?;
        let mut staged = self.clone();
        let mut opcodes = Vec::with_capacity(definitions.len());
        for def in &definitions {
            opcodes.push(staged.extend(&def.sym, &def.body, None)?);
        }
        *self = staged;
        Ok(opcodes)
    }

    /// Swaps the native implementation behind an embedded symbol while
    /// preserving its opcode. Used by versioned upgrades.
    pub fn replace_embedded(
        &mut self,
        sym: &str,
        arity: Arity,
        fun: EmbeddedFn<T>,
        description: Option<&str>,
    ) -> Result<(), LibraryError> {
        let opcode = self.resolve(sym)?;
        match opcode.kind() {
            OpcodeKind::ShortFun if arity.fixed().is_none() => {
                return Err(LibraryError::BadArity {
                    sym: sym.to_string(),
                    reason: "short functions cannot be vararg".to_string(),
                })
            }
            OpcodeKind::ShortFun | OpcodeKind::LongFun => (),
            _ => {
                return Err(LibraryError::WrongKind {
                    sym: sym.to_string(),
                    expected: "embedded",
                })
            }
        }
        if let Arity::Fixed(k) = arity {
            if k > Opcode::MAX_PARAMETERS {
                return Err(LibraryError::BadArity {
                    sym: sym.to_string(),
                    reason: format!("{k} exceeds the maximum of 15"),
                });
            }
        }
        let desc = self
            .by_code
            .get_mut(&opcode.to_u16())
            .expect("resolved symbols have descriptors");
        desc.arity = arity;
        desc.fun = FunImpl::Embedded(fun);
        desc.description = description.map(str::to_string);
        Ok(())
    }

    /// Recompiles the body behind an extended symbol while preserving its
    /// opcode.
    pub fn replace_extended(
        &mut self,
        sym: &str,
        source: &str,
        description: Option<&str>,
    ) -> Result<(), LibraryError> {
        let opcode = self.resolve(sym)?;
        if opcode.kind() != OpcodeKind::ExtendedFun {
            return Err(LibraryError::WrongKind {
                sym: sym.to_string(),
                expected: "extended",
            });
        }
        let compiled = compiler::compile_with_local(self, None, source)?;
        let (body, num_params) = decoder::decode_with_local(self, None, &compiled.bytecode)?;

        let desc = self
            .by_code
            .get_mut(&opcode.to_u16())
            .expect("resolved symbols have descriptors");
        desc.arity = Arity::Fixed(num_params);
        desc.bytecode = Some(compiled.bytecode);
        desc.source = Some(source.to_string());
        desc.description = description.map(str::to_string);
        desc.fun = FunImpl::Expression(Arc::new(body));
        Ok(())
    }

    fn resolve(&self, sym: &str) -> Result<Opcode, LibraryError> {
        self.by_sym
            .get(sym)
            .copied()
            .ok_or_else(|| LibraryError::UnknownSymbol(sym.to_string()))
    }

    /// Descriptor behind a symbol.
    pub fn descriptor(&self, sym: &str) -> Option<&FunDescriptor<T>> {
        let opcode = self.by_sym.get(sym)?;
        self.by_code.get(&opcode.to_u16())
    }

    /// Descriptor behind an opcode.
    pub fn descriptor_by_opcode(&self, opcode: Opcode) -> Option<&FunDescriptor<T>> {
        self.by_code.get(&opcode.to_u16())
    }

    /// All descriptors in ascending opcode order.
    pub fn functions(&self) -> impl Iterator<Item = &FunDescriptor<T>> {
        self.by_code.values()
    }

    /// Number of embedded functions in the short range, the parameter
    /// pseudo-functions included.
    pub fn num_embedded_short(&self) -> u16 {
        self.by_code
            .range(..=Opcode::LAST_SHORT_FUN)
            .count() as u16
    }

    /// Number of embedded functions in the long range.
    pub fn num_embedded_long(&self) -> u16 {
        self.by_code
            .range(Opcode::FIRST_LONG_FUN..=Opcode::LAST_LONG_FUN)
            .count() as u16
    }

    /// Number of extended functions.
    pub fn num_extended(&self) -> u16 {
        self.by_code
            .range(Opcode::FIRST_EXTENDED_FUN..=Opcode::LAST_EXTENDED_FUN)
            .count() as u16
    }

    /// The canonical bytes the compiler emits for an invocation of `sym`
    /// with `arity` arguments: 1 byte for short calls, 2 for long and
    /// extended ones.
    pub fn call_prefix(&self, sym: &str, arity: u8) -> Result<Vec<u8>, LibraryError> {
        let desc = self
            .descriptor(sym)
            .ok_or_else(|| LibraryError::UnknownSymbol(sym.to_string()))?;
        if !desc.arity.accepts(arity) {
            return Err(LibraryError::ArityMismatch {
                sym: sym.to_string(),
                expected: desc.arity.to_string(),
                got: arity,
            });
        }
        let prefix = if desc.opcode.is_short() {
            CallPrefix::short(desc.opcode)?
        } else {
            CallPrefix::long(desc.opcode, arity)?
        };
        Ok(prefix.to_vec())
    }

    /// The structural hash: Blake2b-256 over the three range counters and
    /// the ordered `(opcode, arity, symbol, body)` sequence. Source texts
    /// and descriptions are deliberately excluded, so equivalent libraries
    /// built from different textual forms hash identically.
    pub fn library_hash(&self) -> [u8; 32] {
        let mut hasher = Hasher::default();
        hasher.input(self.num_embedded_short().to_be_bytes());
        hasher.input(self.num_embedded_long().to_be_bytes());
        hasher.input(self.num_extended().to_be_bytes());
        for (code, desc) in &self.by_code {
            hasher.input(code.to_be_bytes());
            hasher.input([desc.arity.as_byte()]);
            hasher.input([desc.sym.len() as u8]);
            hasher.input(desc.sym.as_bytes());
            let body = desc.bytecode.as_deref().unwrap_or_default();
            hasher.input((body.len() as u16).to_be_bytes());
            hasher.input(body);
        }
        hasher.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_library_holds_only_parameters() {
        let lib = Library::<()>::new();
        assert_eq!(lib.num_embedded_short(), 30);
        assert_eq!(lib.num_embedded_long(), 0);
        assert_eq!(lib.num_extended(), 0);
        assert_eq!(lib.descriptor("$0").unwrap().opcode(), Opcode::new(0));
        assert_eq!(lib.descriptor("$14").unwrap().opcode(), Opcode::new(14));
        assert_eq!(lib.descriptor("$$0").unwrap().opcode(), Opcode::new(16));
        assert_eq!(lib.descriptor("$$14").unwrap().opcode(), Opcode::new(30));
    }

    #[test]
    fn short_allocation_starts_above_the_parameter_block() {
        let mut lib = Library::<()>::new();
        let opcode = lib
            .embed_short("first", 1, |_| Ok(Vec::new()), None)
            .unwrap();
        assert_eq!(opcode, Opcode::new(Opcode::FIRST_SHORT_FUN));

        let opcode = lib
            .embed_long("second", Arity::Vararg, |_| Ok(Vec::new()), None)
            .unwrap();
        assert_eq!(opcode, Opcode::new(Opcode::FIRST_LONG_FUN));
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let mut lib = Library::<()>::new();
        lib.embed_short("dup", 0, |_| Ok(Vec::new()), None).unwrap();
        let err = lib.embed_long("dup", Arity::Vararg, |_| Ok(Vec::new()), None);
        assert_eq!(err.unwrap_err(), LibraryError::DuplicateSymbol("dup".into()));
    }

    #[test]
    fn short_range_overflow_is_reported() {
        let mut lib = Library::<()>::new();
        for i in 0..(Opcode::LAST_SHORT_FUN - Opcode::FIRST_SHORT_FUN + 1) {
            lib.embed_short(&format!("s{i}"), 0, |_| Ok(Vec::new()), None)
                .unwrap();
        }
        let err = lib.embed_short("overflow", 0, |_| Ok(Vec::new()), None);
        assert_eq!(err.unwrap_err(), LibraryError::RangeFull("short embedded"));
    }

    #[test]
    fn hash_ignores_descriptions_but_not_structure() {
        let mut a = Library::<()>::new();
        let mut b = Library::<()>::new();
        a.embed_short("f", 2, |_| Ok(Vec::new()), Some("described")).unwrap();
        b.embed_short("f", 2, |_| Ok(Vec::new()), None).unwrap();
        assert_eq!(a.library_hash(), b.library_hash());

        b.embed_short("g", 1, |_| Ok(Vec::new()), None).unwrap();
        assert_ne!(a.library_hash(), b.library_hash());
    }
}
