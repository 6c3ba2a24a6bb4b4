//! Source-to-bytecode compilation: post-order emission over the parsed
//! tree, literal resolution, and tracking of the highest parameter index,
//! which determines the arity of the enclosing definition.

use covenant_asm::{data_atom, CallPrefix, Opcode, MAX_INLINE_DATA_LEN};

use crate::error::CompileError;
use crate::library::Library;
use crate::local::LocalLibrary;
use crate::parser::{self, ParsedExpr};

/// Result of compiling one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledExpression {
    /// Canonical bytecode.
    pub bytecode: Vec<u8>,
    /// Highest `$i` / `$$i` index referenced anywhere in the tree, plus
    /// one. This is the arity a definition with this body receives.
    pub num_params: u8,
}

impl<T> Library<T> {
    /// Compiles one expression against this library.
    pub fn compile_expression(&self, source: &str) -> Result<CompiledExpression, CompileError> {
        compile_with_local(self, None, source)
    }

    /// Panicking counterpart of [`Library::compile_expression`] for tests
    /// and build-time constants.
    pub fn must_compile(&self, source: &str) -> CompiledExpression {
        self.compile_expression(source)
            .expect("expression source compiles")
    }
}

pub(crate) fn compile_with_local<T>(
    lib: &Library<T>,
    local: Option<&LocalLibrary>,
    source: &str,
) -> Result<CompiledExpression, CompileError> {
    let parsed = parser::parse_expression(source)?;
    let mut emitter = Emitter {
        lib,
        local,
        out: Vec::new(),
        max_param: None,
    };
    emitter.emit(&parsed)?;
    Ok(CompiledExpression {
        bytecode: emitter.out,
        num_params: emitter.max_param.map_or(0, |m| m + 1),
    })
}

struct Emitter<'a, T> {
    lib: &'a Library<T>,
    local: Option<&'a LocalLibrary>,
    out: Vec<u8>,
    max_param: Option<u8>,
}

impl<T> Emitter<'_, T> {
    fn emit(&mut self, node: &ParsedExpr) -> Result<(), CompileError> {
        if node.args.is_empty() && self.emit_literal(&node.sym)? {
            return Ok(());
        }
        self.emit_call(node)
    }

    fn note_param(&mut self, idx: u8) {
        self.max_param = Some(self.max_param.map_or(idx, |m| m.max(idx)));
    }

    fn param_index(token: &str, digits: &str) -> Result<u8, CompileError> {
        let idx: u8 = digits
            .parse()
            .map_err(|_| CompileError::ParamIndex(token.to_string()))?;
        if idx >= Opcode::MAX_PARAMETERS {
            return Err(CompileError::ParamIndex(token.to_string()));
        }
        Ok(idx)
    }

    fn push_data(&mut self, payload: &[u8]) -> Result<(), CompileError> {
        if payload.len() > MAX_INLINE_DATA_LEN {
            return Err(CompileError::DataTooLong(payload.len()));
        }
        self.out.extend_from_slice(&data_atom(payload)?);
        Ok(())
    }

    /// Tries every literal form in the fixed resolution order. Returns
    /// `false` when the token is no literal and must resolve as a symbol.
    fn emit_literal(&mut self, token: &str) -> Result<bool, CompileError> {
        // Decimal byte constant.
        if token.bytes().all(|b| b.is_ascii_digit()) {
            let value: u64 = token
                .parse()
                .map_err(|_| CompileError::LiteralRange(token.to_string()))?;
            let byte =
                u8::try_from(value).map_err(|_| CompileError::LiteralRange(token.to_string()))?;
            self.push_data(&[byte])?;
            return Ok(true);
        }

        // Parameter references; `$$` before `$`.
        if let Some(digits) = token.strip_prefix("$$") {
            let idx = Self::param_index(token, digits)?;
            self.note_param(idx);
            self.out
                .extend_from_slice(CallPrefix::short(Opcode::bytecode_param(idx))?.as_slice());
            return Ok(true);
        }
        if let Some(digits) = token.strip_prefix('$') {
            let idx = Self::param_index(token, digits)?;
            self.note_param(idx);
            self.out
                .extend_from_slice(CallPrefix::short(Opcode::eval_param(idx))?.as_slice());
            return Ok(true);
        }

        // The canonical empty slice.
        if token == "nil" {
            self.push_data(&[])?;
            return Ok(true);
        }

        // Hex data, and hex-encoded pre-compiled bytecode spliced verbatim.
        if let Some(digits) = token.strip_prefix("0x") {
            let payload = hex::decode(digits)
                .map_err(|_| CompileError::BadHexLiteral(token.to_string()))?;
            self.push_data(&payload)?;
            return Ok(true);
        }
        if let Some(digits) = token.strip_prefix("x/") {
            let raw = hex::decode(digits)
                .map_err(|_| CompileError::BadHexLiteral(token.to_string()))?;
            self.out.extend_from_slice(&raw);
            return Ok(true);
        }

        // Fixed-width big-endian numbers, plain and zero-trimmed.
        for (prefix, width) in [("u16/", 2usize), ("u32/", 4), ("u64/", 8)] {
            if let Some(digits) = token.strip_prefix(prefix) {
                let bytes = Self::number_bytes(token, digits, width)?;
                self.push_data(&bytes)?;
                return Ok(true);
            }
        }
        for (prefix, width) in [("z16/", 2usize), ("z32/", 4), ("z64/", 8)] {
            if let Some(digits) = token.strip_prefix(prefix) {
                let bytes = Self::number_bytes(token, digits, width)?;
                let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
                self.push_data(&bytes[start..])?;
                return Ok(true);
            }
        }

        // The call prefix of a function, as inline data.
        if let Some(name) = token.strip_prefix('#') {
            let prefix = self.prefix_of(name)?;
            self.push_data(&prefix)?;
            return Ok(true);
        }

        // `!!!message`: sugar for a call to `fail`.
        if let Some(message) = token.strip_prefix("!!!") {
            let text = message.replace('_', " ");
            let fail = self
                .lib
                .descriptor("fail")
                .ok_or_else(|| CompileError::UnknownSymbol("fail".to_string()))?;
            self.out
                .extend_from_slice(CallPrefix::long(fail.opcode(), 1)?.as_slice());
            self.push_data(text.as_bytes())?;
            return Ok(true);
        }

        Ok(false)
    }

    fn number_bytes(token: &str, digits: &str, width: usize) -> Result<Vec<u8>, CompileError> {
        let value: u64 = digits
            .parse()
            .map_err(|_| CompileError::LiteralRange(token.to_string()))?;
        let wide = value.to_be_bytes();
        if wide[..8 - width].iter().any(|b| *b != 0) {
            return Err(CompileError::LiteralRange(token.to_string()));
        }
        Ok(wide[8 - width..].to_vec())
    }

    /// Canonical call prefix of `name` at its declared arity, local
    /// definitions shadowing global ones.
    fn prefix_of(&self, name: &str) -> Result<Vec<u8>, CompileError> {
        if let Some((slot, num_params)) = self.local.and_then(|l| l.find(name)) {
            return Ok(CallPrefix::local(slot, num_params)?.to_vec());
        }
        let desc = self
            .lib
            .descriptor(name)
            .ok_or_else(|| CompileError::UnknownSymbol(name.to_string()))?;
        let arity = desc
            .arity()
            .fixed()
            .ok_or_else(|| CompileError::VarargPrefix(name.to_string()))?;
        let prefix = if desc.opcode().is_short() {
            CallPrefix::short(desc.opcode())?
        } else {
            CallPrefix::long(desc.opcode(), arity)?
        };
        Ok(prefix.to_vec())
    }

    fn emit_call(&mut self, node: &ParsedExpr) -> Result<(), CompileError> {
        if node.args.len() > Opcode::MAX_PARAMETERS as usize {
            return Err(CompileError::TooManyArguments {
                sym: node.sym.clone(),
                got: node.args.len(),
            });
        }
        let arity = node.args.len() as u8;

        if let Some((slot, num_params)) = self.local.and_then(|l| l.find(&node.sym)) {
            if arity != num_params {
                return Err(CompileError::ArityMismatch {
                    sym: node.sym.clone(),
                    expected: num_params.to_string(),
                    got: node.args.len(),
                });
            }
            self.out
                .extend_from_slice(CallPrefix::local(slot, arity)?.as_slice());
        } else {
            let desc = self
                .lib
                .descriptor(&node.sym)
                .ok_or_else(|| CompileError::UnknownSymbol(node.sym.clone()))?;
            if !desc.arity().accepts(arity) {
                return Err(CompileError::ArityMismatch {
                    sym: node.sym.clone(),
                    expected: desc.arity().to_string(),
                    got: node.args.len(),
                });
            }
            if desc.opcode().is_short() {
                self.out
                    .extend_from_slice(CallPrefix::short(desc.opcode())?.as_slice());
            } else {
                self.out
                    .extend_from_slice(CallPrefix::long(desc.opcode(), arity)?.as_slice());
            }
        }

        for arg in &node.args {
            self.emit(arg)?;
        }
        Ok(())
    }
}
