//! The embedded operation set: data manipulation, logic, fixed 64-bit
//! arithmetic, bitwise operations, cryptography and the bytecode
//! introspection primitives.
//!
//! Each operation is a plain function over a [`CallParams`] handle,
//! registered through the single table in [`entries`] so that registration
//! order (and with it opcode assignment and the structural hash) is fixed
//! in exactly one place.

use std::collections::HashMap;

use crate::error::{ExecError, LibraryError};
use crate::eval::CallParams;
use crate::library::{Arity, EmbeddedFn, Library};

mod arith;
mod crypto;
mod data;
mod logic;
mod reflect;

/// Canonical truth value of boolean-valued operations.
pub(crate) const TRUE: [u8; 1] = [0x01];

pub(crate) fn bool_value(b: bool) -> Vec<u8> {
    if b {
        TRUE.to_vec()
    } else {
        Vec::new()
    }
}

/// Evaluates argument `n` and requires it to be exactly one byte, the shape
/// of every index and count operand.
pub(crate) fn byte_operand<T>(p: &CallParams<'_, T>, n: usize) -> Result<u8, ExecError> {
    let value = p.arg(n)?;
    match value.as_slice() {
        [byte] => Ok(*byte),
        _ => Err(p.panic(format!(
            "operand {n} must be exactly one byte, got {}",
            value.len()
        ))),
    }
}

/// Symbol → native implementation table used by descriptor-file loaders to
/// resurrect embedded entries.
pub type Embeddings<T> = HashMap<String, EmbeddedFn<T>>;

struct OpEntry<T> {
    sym: &'static str,
    short: bool,
    arity: Arity,
    fun: EmbeddedFn<T>,
    description: &'static str,
}

fn entries<T>() -> Vec<OpEntry<T>> {
    use Arity::{Fixed, Vararg};

    fn op<T>(
        sym: &'static str,
        short: bool,
        arity: Arity,
        fun: EmbeddedFn<T>,
        description: &'static str,
    ) -> OpEntry<T> {
        OpEntry {
            sym,
            short,
            arity,
            fun,
            description,
        }
    }

    vec![
        // Short range: the hot data operations.
        op("slice", true, Fixed(3), data::slice, "slice($0 from $1 to $2 inclusive)"),
        op("byte", true, Fixed(2), data::byte, "byte $1 of $0"),
        op("tail", true, Fixed(2), data::tail, "$0 from byte $1 on"),
        op("len", true, Fixed(1), data::len, "length of $0 as 8 big-endian bytes"),
        op("repeat", true, Fixed(2), data::repeat, "$0 repeated $1 times"),
        op("equal", true, Fixed(2), data::equal, "true when $0 and $1 are byte-equal"),
        op("hasPrefix", true, Fixed(2), data::has_prefix, "true when $0 starts with $1"),
        op("isZero", true, Fixed(1), data::is_zero, "true when every byte of $0 is 0x00"),
        op("not", true, Fixed(1), data::not, "true when $0 is empty"),
        op("if", true, Fixed(3), data::if_then_else, "$1 when $0 is not empty, $2 otherwise"),
        // Long range: varargs, arithmetic, crypto, reflection.
        op("concat", false, Vararg, data::concat, "concatenation of all arguments"),
        op("and", false, Vararg, logic::and, "true when no argument is empty"),
        op("or", false, Vararg, logic::or, "true when any argument is not empty"),
        op(
            "firstCaseIndex",
            false,
            Vararg,
            logic::first_case_index,
            "index of the first non-empty argument, or empty",
        ),
        op(
            "firstEqualIndex",
            false,
            Vararg,
            logic::first_equal_index,
            "index of the first argument equal to $0, or empty",
        ),
        op(
            "selectCaseByIndex",
            false,
            Vararg,
            logic::select_case_by_index,
            "argument picked by the 1-byte index $0, or empty",
        ),
        op("add", false, Fixed(2), arith::add, "$0 + $1 on 8 big-endian bytes"),
        op("sub", false, Fixed(2), arith::sub, "$0 - $1, panic on underflow"),
        op("mul", false, Fixed(2), arith::mul, "$0 * $1, panic on overflow"),
        op("div", false, Fixed(2), arith::div, "$0 / $1, panic on zero divisor"),
        op("mod", false, Fixed(2), arith::modulo, "$0 mod $1, panic on zero divisor"),
        op(
            "uint8Bytes",
            false,
            Fixed(1),
            arith::uint8_bytes,
            "$0 left-padded with zero bytes to 8 bytes",
        ),
        op(
            "lessThan",
            false,
            Fixed(2),
            arith::less_than,
            "lexicographic $0 < $1, equal length required",
        ),
        op("lshift64", false, Fixed(2), arith::lshift64, "$0 << $1 on u64"),
        op("rshift64", false, Fixed(2), arith::rshift64, "$0 >> $1 on u64"),
        op("bitwiseAND", false, Fixed(2), arith::bitwise_and, "bitwise $0 & $1"),
        op("bitwiseOR", false, Fixed(2), arith::bitwise_or, "bitwise $0 | $1"),
        op("bitwiseXOR", false, Fixed(2), arith::bitwise_xor, "bitwise $0 ^ $1"),
        op("bitwiseNOT", false, Fixed(1), arith::bitwise_not, "bitwise complement of $0"),
        op(
            "blake2b",
            false,
            Vararg,
            crypto::blake2b,
            "Blake2b-256 of the concatenated arguments",
        ),
        op(
            "validSignatureED25519",
            false,
            Fixed(3),
            crypto::valid_signature_ed25519,
            "true when $1 is a valid signature of $0 by public key $2",
        ),
        op("fail", false, Fixed(1), logic::fail, "panic with $0 as the message"),
        op(
            "parsePrefixBytecode",
            false,
            Fixed(1),
            reflect::parse_prefix_bytecode,
            "call prefix of the bytecode $0",
        ),
        op(
            "parseArgumentBytecode",
            false,
            Fixed(3),
            reflect::parse_argument_bytecode,
            "argument $2 of the bytecode $0, which must carry prefix $1",
        ),
        op(
            "parseInlineData",
            false,
            Fixed(1),
            reflect::parse_inline_data,
            "payload of the inline-data bytecode $0",
        ),
        op("eval", false, Fixed(1), reflect::eval_bytecode, "value of the closed bytecode $0"),
        op(
            "callLocalLibrary",
            false,
            Vararg,
            reflect::call_local_library,
            "dispatch into slot $1 of the tuple-encoded local library $0",
        ),
    ]
}

/// Registers the base operation set; opcodes are assigned in table order.
pub(crate) fn register<T>(lib: &mut Library<T>) -> Result<(), LibraryError> {
    for entry in entries::<T>() {
        match (entry.short, entry.arity) {
            (true, Arity::Fixed(arity)) => {
                lib.embed_short(entry.sym, arity, entry.fun, Some(entry.description))?;
            }
            (true, Arity::Vararg) => unreachable!("short operations are never vararg"),
            (false, arity) => {
                lib.embed_long(entry.sym, arity, entry.fun, Some(entry.description))?;
            }
        }
    }
    Ok(())
}

/// The symbol → implementation table of the base operation set.
pub fn base_embeddings<T>() -> Embeddings<T> {
    entries::<T>()
        .into_iter()
        .map(|entry| (entry.sym.to_string(), entry.fun))
        .collect()
}
