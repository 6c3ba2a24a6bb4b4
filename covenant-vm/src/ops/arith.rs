//! Fixed 64-bit arithmetic, shifts and bitwise operations. Every numeric
//! operand is widened to 8 bytes by left zero-padding; operands longer
//! than 8 bytes panic, and every numeric result is 8 big-endian bytes.

use crate::error::ExecError;
use crate::eval::CallParams;
use crate::ops::bool_value;

fn wide_operand<T>(p: &CallParams<'_, T>, n: usize) -> Result<u64, ExecError> {
    let value = p.arg(n)?;
    if value.len() > 8 {
        return Err(p.panic(format!(
            "operand {n} of {} bytes exceeds 8 bytes",
            value.len()
        )));
    }
    let mut buf = [0u8; 8];
    buf[8 - value.len()..].copy_from_slice(&value);
    Ok(u64::from_be_bytes(buf))
}

fn wide_result(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub(super) fn add<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let (a, b) = (wide_operand(p, 0)?, wide_operand(p, 1)?);
    a.checked_add(b)
        .map(wide_result)
        .ok_or_else(|| p.panic(format!("overflow in {a} + {b}")))
}

pub(super) fn sub<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let (a, b) = (wide_operand(p, 0)?, wide_operand(p, 1)?);
    a.checked_sub(b)
        .map(wide_result)
        .ok_or_else(|| p.panic(format!("underflow in {a} - {b}")))
}

pub(super) fn mul<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let (a, b) = (wide_operand(p, 0)?, wide_operand(p, 1)?);
    a.checked_mul(b)
        .map(wide_result)
        .ok_or_else(|| p.panic(format!("overflow in {a} * {b}")))
}

pub(super) fn div<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let (a, b) = (wide_operand(p, 0)?, wide_operand(p, 1)?);
    a.checked_div(b)
        .map(wide_result)
        .ok_or_else(|| p.panic("division by zero"))
}

pub(super) fn modulo<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let (a, b) = (wide_operand(p, 0)?, wide_operand(p, 1)?);
    a.checked_rem(b)
        .map(wide_result)
        .ok_or_else(|| p.panic("division by zero"))
}

pub(super) fn uint8_bytes<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    Ok(wide_result(wide_operand(p, 0)?))
}

pub(super) fn less_than<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let (a, b) = (p.arg(0)?, p.arg(1)?);
    if a.len() != b.len() {
        return Err(p.panic(format!(
            "operands of unequal length, {} vs {} bytes",
            a.len(),
            b.len()
        )));
    }
    Ok(bool_value(a < b))
}

pub(super) fn lshift64<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let (a, shift) = (wide_operand(p, 0)?, wide_operand(p, 1)?);
    let shifted = u32::try_from(shift)
        .ok()
        .and_then(|s| a.checked_shl(s))
        .unwrap_or(0);
    Ok(wide_result(shifted))
}

pub(super) fn rshift64<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    let (a, shift) = (wide_operand(p, 0)?, wide_operand(p, 1)?);
    let shifted = u32::try_from(shift)
        .ok()
        .and_then(|s| a.checked_shr(s))
        .unwrap_or(0);
    Ok(wide_result(shifted))
}

fn zip_bytes<T>(
    p: &CallParams<'_, T>,
    combine: fn(u8, u8) -> u8,
) -> Result<Vec<u8>, ExecError> {
    let (a, b) = (p.arg(0)?, p.arg(1)?);
    if a.len() != b.len() {
        return Err(p.panic(format!(
            "operands of unequal length, {} vs {} bytes",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| combine(*x, *y)).collect())
}

pub(super) fn bitwise_and<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    zip_bytes(p, |a, b| a & b)
}

pub(super) fn bitwise_or<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    zip_bytes(p, |a, b| a | b)
}

pub(super) fn bitwise_xor<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    zip_bytes(p, |a, b| a ^ b)
}

pub(super) fn bitwise_not<T>(p: &mut CallParams<'_, T>) -> Result<Vec<u8>, ExecError> {
    Ok(p.arg(0)?.iter().map(|b| !b).collect())
}
