//! Bytecode introspection: the operations that make the language partially
//! reflective. They all operate on bytecode carried as runtime values,
//! typically obtained through `$$i` references.

use covenant_asm::RawAtom;

use crate::error::ExecError;
use crate::eval::CallParams;
use crate::ops::byte_operand;
use crate::tuple;

pub(super) fn parse_prefix_bytecode<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let code = p.arg(0)?;
    let (atom, _) = RawAtom::parse(&code).map_err(|e| p.panic(e.to_string()))?;
    Ok(code[..atom.prefix_len()].to_vec())
}

pub(super) fn parse_argument_bytecode<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let code = p.arg(0)?;
    let expected_prefix = p.arg(1)?;
    let idx = byte_operand(p, 2)? as usize;

    let one = p
        .library()
        .parse_one_level(&code)
        .map_err(|e| p.panic(e.to_string()))?;
    if one.prefix != expected_prefix {
        return Err(p.panic(format!(
            "prefix mismatch: expected 0x{}, found 0x{}",
            hex::encode(&expected_prefix),
            hex::encode(&one.prefix)
        )));
    }
    match one.args.get(idx) {
        Some(arg) => Ok(arg.clone()),
        None => Err(p.panic(format!(
            "argument index {idx} out of range for {} arguments",
            one.args.len()
        ))),
    }
}

pub(super) fn parse_inline_data<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let code = p.arg(0)?;
    match RawAtom::parse(&code) {
        Ok((RawAtom::Data(payload), consumed)) if consumed == code.len() => Ok(payload.to_vec()),
        Ok((RawAtom::Data(_), consumed)) => {
            Err(p.panic(format!("trailing bytes after inline data at offset {consumed}")))
        }
        Ok(_) => Err(p.panic("bytecode does not start with an inline-data prefix")),
        Err(e) => Err(p.panic(e.to_string())),
    }
}

pub(super) fn eval_bytecode<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let code = p.arg(0)?;
    let (expr, num_params) = p.library().decode_expression(&code)?;
    if num_params != 0 {
        return Err(p.panic(format!(
            "expression with {num_params} open parameters is not closed"
        )));
    }
    p.eval_closed(&expr)
}

pub(super) fn call_local_library<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    if p.arity() < 2 {
        return Err(p.panic("expects a library tuple and a slot index"));
    }
    let lib_tuple = p.arg(0)?;
    let slot = byte_operand(p, 1)?;

    let blobs = tuple::from_tuple(&lib_tuple)
        .map_err(crate::error::DecodeError::from)?;
    let local = p.library().local_library_from_bytes(&blobs)?;
    let fun = local
        .get(slot)
        .ok_or_else(|| p.panic(format!("slot {slot} out of range")))?;

    let provided = p.arity() - 2;
    if provided != fun.num_params() {
        return Err(p.panic(format!(
            "slot {slot} expects {} arguments, got {provided}",
            fun.num_params()
        )));
    }
    p.call_local(&fun, 2)
}
