//! Data manipulation operations.

use crate::error::ExecError;
use crate::eval::CallParams;
use crate::ops::{bool_value, byte_operand};

pub(super) fn slice<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let data = p.arg(0)?;
    let from = byte_operand(p, 1)? as usize;
    let to = byte_operand(p, 2)? as usize;
    if from > to {
        return Err(p.panic(format!("from {from} greater than to {to}")));
    }
    if to >= data.len() {
        return Err(p.panic(format!(
            "bound {to} out of range for {} bytes",
            data.len()
        )));
    }
    Ok(p.alloc_data(&data[from..=to]))
}

pub(super) fn byte<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let data = p.arg(0)?;
    let idx = byte_operand(p, 1)? as usize;
    match data.get(idx) {
        Some(b) => Ok(vec![*b]),
        None => Err(p.panic(format!(
            "index {idx} out of range for {} bytes",
            data.len()
        ))),
    }
}

pub(super) fn tail<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let data = p.arg(0)?;
    let from = byte_operand(p, 1)? as usize;
    if from > data.len() {
        return Err(p.panic(format!(
            "index {from} out of range for {} bytes",
            data.len()
        )));
    }
    Ok(p.alloc_data(&data[from..]))
}

pub(super) fn len<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let data = p.arg(0)?;
    Ok((data.len() as u64).to_be_bytes().to_vec())
}

pub(super) fn concat<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let mut out = Vec::new();
    for n in 0..p.arity() as usize {
        out.extend_from_slice(&p.arg(n)?);
    }
    Ok(out)
}

pub(super) fn repeat<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let data = p.arg(0)?;
    let times = byte_operand(p, 1)? as usize;
    Ok(data.repeat(times))
}

pub(super) fn equal<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    Ok(bool_value(p.arg(0)? == p.arg(1)?))
}

pub(super) fn has_prefix<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let data = p.arg(0)?;
    let prefix = p.arg(1)?;
    Ok(bool_value(data.starts_with(&prefix)))
}

pub(super) fn is_zero<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let data = p.arg(0)?;
    Ok(bool_value(data.iter().all(|b| *b == 0)))
}

pub(super) fn not<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    Ok(bool_value(p.arg(0)?.is_empty()))
}

pub(super) fn if_then_else<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    if p.arg(0)?.is_empty() {
        p.arg(2)
    } else {
        p.arg(1)
    }
}
