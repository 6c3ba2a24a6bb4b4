//! Bytecode-to-tree decoding: recursive descent over atoms, symbol
//! recovery, and arity verification against the registry.

use std::sync::Arc;

use covenant_asm::{Opcode, OpcodeKind, RawAtom};

use crate::error::DecodeError;
use crate::expression::{BytecodeRef, ExprKind, Expression};
use crate::library::{Arity, Library};
use crate::local::{LocalFn, LocalLibrary};

impl<T> Library<T> {
    /// Decodes a closed bytecode slice into an executable tree. Returns the
    /// tree together with the number of open parameters (highest referenced
    /// index plus one).
    pub fn decode_expression(&self, code: &[u8]) -> Result<(Expression, u8), DecodeError> {
        decode_with_local(self, None, code)
    }

    /// Like [`Library::decode_expression`], resolving local-library calls
    /// against `local`.
    pub fn decode_expression_with_local(
        &self,
        code: &[u8],
        local: &LocalLibrary,
    ) -> Result<(Expression, u8), DecodeError> {
        decode_with_local(self, Some(local), code)
    }
}

pub(crate) fn decode_with_local<T>(
    lib: &Library<T>,
    local: Option<&LocalLibrary>,
    code: &[u8],
) -> Result<(Expression, u8), DecodeError> {
    let decoder = Decoder {
        lib,
        local,
        bytes: Arc::from(code),
        pos: 0,
        max_param: None,
    };
    decoder.run()
}

/// One parsed atom header with its borrowed payload already detached.
enum Step {
    Data(Vec<u8>),
    Short(Opcode),
    Long { opcode: Opcode, arity: u8 },
    Local { slot: u8, arity: u8 },
}

struct Decoder<'a, T> {
    lib: &'a Library<T>,
    local: Option<&'a LocalLibrary>,
    bytes: Arc<[u8]>,
    pos: usize,
    max_param: Option<u8>,
}

impl<T> Decoder<'_, T> {
    fn run(mut self) -> Result<(Expression, u8), DecodeError> {
        let expr = self.atom()?;
        if self.pos != self.bytes.len() {
            return Err(DecodeError::TrailingBytes(self.pos));
        }
        Ok((expr, self.max_param.map_or(0, |m| m + 1)))
    }

    fn note_param(&mut self, idx: u8) {
        self.max_param = Some(self.max_param.map_or(idx, |m| m.max(idx)));
    }

    fn step(&mut self) -> Result<Step, DecodeError> {
        let (atom, consumed) = RawAtom::parse(&self.bytes[self.pos..])?;
        let step = match atom {
            RawAtom::Data(payload) => Step::Data(payload.to_vec()),
            RawAtom::ShortCall(opcode) => Step::Short(opcode),
            RawAtom::LongCall { opcode, arity } => Step::Long { opcode, arity },
            RawAtom::LocalCall { slot, arity } => Step::Local { slot, arity },
        };
        self.pos += consumed;
        Ok(step)
    }

    fn args(&mut self, arity: u8) -> Result<Vec<Expression>, DecodeError> {
        (0..arity).map(|_| self.atom()).collect()
    }

    fn atom(&mut self) -> Result<Expression, DecodeError> {
        let start = self.pos;
        let kind = match self.step()? {
            Step::Data(payload) => ExprKind::Data(payload),
            Step::Short(opcode) => {
                if let OpcodeKind::EvalParam(i) | OpcodeKind::BytecodeParam(i) = opcode.kind() {
                    self.note_param(i);
                }
                let desc = self
                    .lib
                    .descriptor_by_opcode(opcode)
                    .ok_or(DecodeError::UnknownOpcode(opcode.to_u16()))?;
                let sym = Arc::clone(&desc.sym);
                let arity = match desc.arity() {
                    Arity::Fixed(k) => k,
                    Arity::Vararg => unreachable!("short functions are never vararg"),
                };
                ExprKind::Call {
                    opcode,
                    sym,
                    args: self.args(arity)?,
                }
            }
            Step::Long { opcode, arity } => {
                // Only the two-byte ranges are canonical in long form; a
                // short opcode re-encoded long is rejected as unknown.
                match opcode.kind() {
                    OpcodeKind::LongFun | OpcodeKind::ExtendedFun => (),
                    _ => return Err(DecodeError::UnknownOpcode(opcode.to_u16())),
                }
                let desc = self
                    .lib
                    .descriptor_by_opcode(opcode)
                    .ok_or(DecodeError::UnknownOpcode(opcode.to_u16()))?;
                if !desc.arity().accepts(arity) {
                    return Err(DecodeError::ArityMismatch {
                        sym: desc.sym().to_string(),
                        expected: desc.arity().as_byte(),
                        got: arity,
                    });
                }
                let sym = Arc::clone(&desc.sym);
                ExprKind::Call {
                    opcode,
                    sym,
                    args: self.args(arity)?,
                }
            }
            Step::Local { slot, arity } => {
                let local = self.local.ok_or(DecodeError::NoLocalLibrary)?;
                let fun: Arc<LocalFn> =
                    local
                        .get(slot)
                        .ok_or_else(|| DecodeError::LocalSlotOutOfRange {
                            slot,
                            len: local.num_functions(),
                        })?;
                if arity != fun.num_params() {
                    return Err(DecodeError::ArityMismatch {
                        sym: fun.symbol().to_string(),
                        expected: fun.num_params(),
                        got: arity,
                    });
                }
                ExprKind::LocalCall {
                    fun,
                    args: self.args(arity)?,
                }
            }
        };

        Ok(Expression {
            kind,
            bytecode: Some(BytecodeRef::new(Arc::clone(&self.bytes), start..self.pos)),
        })
    }
}
