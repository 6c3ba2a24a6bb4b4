//! Bytecode-to-source decompilation and the one-level parser that
//! underpins the reflective operations.
//!
//! Decompiled source is canonical, not faithful: the write-only literal
//! aliases (`u64/`, `z32/`, `#name`, `!!!msg`) all come back as `nil`,
//! decimal or `0x..` data.

use covenant_asm::{OpcodeKind, RawAtom};

use crate::error::DecodeError;
use crate::expression::{ExprKind, Expression};
use crate::library::Library;
use crate::local::LocalLibrary;

/// Renders an inline-data payload the way the decompiler prints it.
fn format_data(payload: &[u8]) -> String {
    match payload {
        [] => "nil".to_string(),
        [byte] => byte.to_string(),
        bytes => format!("0x{}", hex::encode(bytes)),
    }
}

/// Prints a decoded tree as source text, pre-order.
pub fn decompile_expression(expr: &Expression) -> String {
    let mut out = String::new();
    write_node(expr, &mut out);
    out
}

fn write_node(expr: &Expression, out: &mut String) {
    match &expr.kind {
        ExprKind::Data(payload) => out.push_str(&format_data(payload)),
        ExprKind::Call { sym, args, .. } => write_call(sym, args, out),
        ExprKind::LocalCall { fun, args } => write_call(fun.symbol(), args, out),
    }
}

fn write_call(sym: &str, args: &[Expression], out: &mut String) {
    out.push_str(sym);
    if !args.is_empty() {
        out.push('(');
        for (n, arg) in args.iter().enumerate() {
            if n > 0 {
                out.push(',');
            }
            write_node(arg, out);
        }
        out.push(')');
    }
}

/// The topmost atom of a bytecode slice, split into its parts. The
/// concatenation `prefix ‖ args[0] ‖ … ‖ args[n-1]` is bit-identical to
/// the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneLevel {
    /// Symbol of the call, or the rendered literal for inline data.
    pub sym: String,
    /// Call prefix bytes; for inline data, the entire atom.
    pub prefix: Vec<u8>,
    /// Each argument as its own self-contained bytecode blob.
    pub args: Vec<Vec<u8>>,
}

/// Total byte span of the first atom of `code`, argument sub-trees
/// included. Needs the registry only for short-call arities. Shared with
/// the reflection built-ins, which must agree on spans.
pub(crate) fn atom_span<T>(lib: &Library<T>, code: &[u8]) -> Result<usize, DecodeError> {
    let (atom, consumed) = RawAtom::parse(code)?;
    let arity = match atom {
        RawAtom::Data(_) => 0,
        RawAtom::ShortCall(opcode) => match opcode.kind() {
            OpcodeKind::EvalParam(_) | OpcodeKind::BytecodeParam(_) => 0,
            _ => lib
                .descriptor_by_opcode(opcode)
                .ok_or(DecodeError::UnknownOpcode(opcode.to_u16()))?
                .arity()
                .fixed()
                .unwrap_or(0),
        },
        RawAtom::LongCall { arity, .. } | RawAtom::LocalCall { arity, .. } => arity,
    };
    let mut pos = consumed;
    for _ in 0..arity {
        pos += atom_span(lib, &code[pos..])?;
    }
    Ok(pos)
}

impl<T> Library<T> {
    /// Decompiles bytecode into canonical source text.
    pub fn decompile(&self, code: &[u8]) -> Result<String, DecodeError> {
        let (expr, _) = self.decode_expression(code)?;
        Ok(decompile_expression(&expr))
    }

    /// Decompiles bytecode that may call into `local`.
    pub fn decompile_with_local(
        &self,
        code: &[u8],
        local: &LocalLibrary,
    ) -> Result<String, DecodeError> {
        let (expr, _) = self.decode_expression_with_local(code, local)?;
        Ok(decompile_expression(&expr))
    }

    /// Decodes exactly the topmost call (or inline-data atom) of `code` and
    /// returns each argument as its own bytecode blob. The whole input must
    /// be one atom; trailing bytes are an error.
    pub fn parse_one_level(&self, code: &[u8]) -> Result<OneLevel, DecodeError> {
        let (atom, consumed) = RawAtom::parse(code)?;

        let (sym, arity) = match atom {
            RawAtom::Data(payload) => {
                if consumed != code.len() {
                    return Err(DecodeError::TrailingBytes(consumed));
                }
                return Ok(OneLevel {
                    sym: format_data(payload),
                    prefix: code.to_vec(),
                    args: Vec::new(),
                });
            }
            RawAtom::ShortCall(opcode) => {
                let desc = self
                    .descriptor_by_opcode(opcode)
                    .ok_or(DecodeError::UnknownOpcode(opcode.to_u16()))?;
                (desc.sym().to_string(), desc.arity().fixed().unwrap_or(0))
            }
            RawAtom::LongCall { opcode, arity } => {
                let desc = self
                    .descriptor_by_opcode(opcode)
                    .ok_or(DecodeError::UnknownOpcode(opcode.to_u16()))?;
                (desc.sym().to_string(), arity)
            }
            RawAtom::LocalCall { slot, arity } => (format!("lib#{slot}"), arity),
        };

        let prefix = code[..atom.prefix_len()].to_vec();
        let mut args = Vec::with_capacity(arity as usize);
        let mut pos = atom.prefix_len();
        for _ in 0..arity {
            let span = atom_span(self, &code[pos..])?;
            args.push(code[pos..pos + span].to_vec());
            pos += span;
        }
        if pos != code.len() {
            return Err(DecodeError::TrailingBytes(pos));
        }

        Ok(OneLevel { sym, prefix, args })
    }
}

/// Textual inverse of [`Library::parse_one_level`], used by tooling:
/// prints `sym(a1,…,an)` with each argument rendered as a literal when it
/// is inline data and as spliced bytecode (`x/…`) otherwise.
pub fn compose_one_level<B: AsRef<[u8]>>(sym: &str, args: &[B]) -> String {
    let rendered: Vec<String> = args
        .iter()
        .map(|arg| {
            let arg = arg.as_ref();
            match RawAtom::parse(arg) {
                Ok((RawAtom::Data(payload), consumed)) if consumed == arg.len() => {
                    format_data(payload)
                }
                _ => format!("x/{}", hex::encode(arg)),
            }
        })
        .collect();
    if rendered.is_empty() {
        sym.to_string()
    } else {
        format!("{sym}({})", rendered.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;

    #[test]
    fn decompiled_source_is_canonical() {
        let lib = Library::<()>::base();
        let compiled = lib.must_compile("concat(u64/1337, 123, concat(1, 2, 3), nil)");
        let source = lib.decompile(&compiled.bytecode).unwrap();
        assert_eq!(source, "concat(0x0000000000000539,123,concat(1,2,3),nil)");

        // Recompiling the canonical source reproduces the bytecode.
        assert_eq!(lib.must_compile(&source).bytecode, compiled.bytecode);
    }

    #[test]
    fn parameters_decompile_to_their_references() {
        let lib = Library::<()>::base();
        let compiled = lib.must_compile("concat($0, $$1)");
        assert_eq!(lib.decompile(&compiled.bytecode).unwrap(), "concat($0,$$1)");
    }

    #[test]
    fn one_level_blobs_reassemble_to_the_input() {
        let lib = Library::<()>::base();
        let compiled = lib.must_compile("slice(concat(1, 2), 0, 1)");
        let one = lib.parse_one_level(&compiled.bytecode).unwrap();
        assert_eq!(one.sym, "slice");
        assert_eq!(one.args.len(), 3);

        let mut reassembled = one.prefix.clone();
        for arg in &one.args {
            reassembled.extend_from_slice(arg);
        }
        assert_eq!(reassembled, compiled.bytecode);
    }

    #[test]
    fn one_level_of_inline_data_returns_the_atom_as_prefix() {
        let lib = Library::<()>::base();
        let compiled = lib.must_compile("0xbeef");
        let one = lib.parse_one_level(&compiled.bytecode).unwrap();
        assert_eq!(one.sym, "0xbeef");
        assert_eq!(one.prefix, compiled.bytecode);
        assert!(one.args.is_empty());
    }

    #[test]
    fn compose_renders_data_and_code_differently() {
        let lib = Library::<()>::base();
        let one_byte = lib.must_compile("7").bytecode;
        let longer = lib.must_compile("0xdead").bytecode;
        let empty = lib.must_compile("nil").bytecode;
        let call = lib.must_compile("concat(1, 2)").bytecode;

        let text = compose_one_level("f", &[one_byte, longer, empty, call.clone()]);
        assert_eq!(text, format!("f(7,0xdead,nil,x/{})", hex::encode(&call)));
        assert_eq!(compose_one_level("g", &[] as &[Vec<u8>]), "g");
    }
}
