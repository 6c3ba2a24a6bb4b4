//! Local libraries: a numbered batch of expression bodies compiled
//! together, where later bodies may invoke earlier ones by position. The
//! compiled form is an ordered sequence of bytecode blobs; calls between
//! them use the reserved marker opcode plus one slot byte, so a local
//! library travels inside a single artifact without touching the global
//! opcode space.

use std::sync::Arc;

use covenant_asm::Opcode;

use crate::compiler;
use crate::decoder;
use crate::error::{CompileError, DecodeError, Error};
use crate::expression::Expression;
use crate::library::Library;
use crate::parser;
use crate::tuple;

/// One slot of a local library.
#[derive(Debug)]
pub struct LocalFn {
    sym: String,
    num_params: u8,
    bytecode: Vec<u8>,
    body: Expression,
}

impl LocalFn {
    /// The function's symbol: its source name, or `lib#<slot>` when the
    /// library was reopened from bytes.
    pub fn symbol(&self) -> &str {
        &self.sym
    }

    /// Arity inferred from the highest parameter reference in the body.
    pub fn num_params(&self) -> u8 {
        self.num_params
    }

    /// The compiled body.
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    pub(crate) fn body(&self) -> &Expression {
        &self.body
    }
}

/// An ordered, position-indexed collection of compiled expression bodies.
#[derive(Debug, Default)]
pub struct LocalLibrary {
    funs: Vec<Arc<LocalFn>>,
}

impl LocalLibrary {
    /// Number of functions.
    pub fn num_functions(&self) -> usize {
        self.funs.len()
    }

    /// The function in `slot`, if any.
    pub fn get(&self, slot: u8) -> Option<Arc<LocalFn>> {
        self.funs.get(slot as usize).cloned()
    }

    /// Resolves a symbol to `(slot, num_params)`.
    pub(crate) fn find(&self, sym: &str) -> Option<(u8, u8)> {
        self.funs
            .iter()
            .position(|f| f.sym == sym)
            .map(|slot| (slot as u8, self.funs[slot].num_params))
    }

    /// The functions in slot order.
    pub fn functions(&self) -> impl Iterator<Item = &LocalFn> {
        self.funs.iter().map(Arc::as_ref)
    }

    /// The raw blob sequence, in slot order.
    pub fn to_bytes(&self) -> Vec<Vec<u8>> {
        self.funs.iter().map(|f| f.bytecode.clone()).collect()
    }

    /// The blob sequence framed as one tuple, the on-wire form.
    pub fn to_tuple(&self) -> Result<Vec<u8>, tuple::TupleError> {
        tuple::to_tuple(self.funs.iter().map(|f| f.bytecode.as_slice()))
    }
}

impl<T> Library<T> {
    /// Compiles a `func NAME : BODY` batch into a local library. Bodies
    /// may call the definitions before them by name; forward references
    /// do not resolve.
    pub fn compile_local_library(&self, source: &str) -> Result<LocalLibrary, Error> {
        let definitions = parser::parse_definitions(source).map_err(CompileError::from)?;
        if definitions.len() > Opcode::MAX_LOCAL_FUNS {
            return Err(DecodeError::LocalLibraryTooLarge(definitions.len()).into());
        }

        let mut local = LocalLibrary::default();
        for def in definitions {
            if local.find(&def.sym).is_some() {
                return Err(CompileError::DuplicateSymbol(def.sym).into());
            }
            let compiled = compiler::compile_with_local(self, Some(&local), &def.body)?;
            let (body, num_params) =
                decoder::decode_with_local(self, Some(&local), &compiled.bytecode)?;
            debug_assert_eq!(num_params, compiled.num_params);
            local.funs.push(Arc::new(LocalFn {
                sym: def.sym,
                num_params: compiled.num_params,
                bytecode: compiled.bytecode,
                body,
            }));
        }
        Ok(local)
    }

    /// Reopens a local library from its raw blob sequence. Any prefix of a
    /// valid sequence is itself valid; the symbols become `lib#<slot>`.
    pub fn local_library_from_bytes<B>(&self, blobs: &[B]) -> Result<LocalLibrary, DecodeError>
    where
        B: AsRef<[u8]>,
    {
        if blobs.len() > Opcode::MAX_LOCAL_FUNS {
            return Err(DecodeError::LocalLibraryTooLarge(blobs.len()));
        }

        let mut local = LocalLibrary::default();
        for (slot, blob) in blobs.iter().enumerate() {
            let blob = blob.as_ref();
            let (body, num_params) = decoder::decode_with_local(self, Some(&local), blob)?;
            local.funs.push(Arc::new(LocalFn {
                sym: format!("lib#{slot}"),
                num_params,
                bytecode: blob.to_vec(),
                body,
            }));
        }
        Ok(local)
    }

    /// Reopens a local library from its tuple-framed wire form.
    pub fn local_library_from_tuple(&self, bytes: &[u8]) -> Result<LocalLibrary, DecodeError> {
        let blobs = tuple::from_tuple(bytes)?;
        self.local_library_from_bytes(&blobs)
    }
}
