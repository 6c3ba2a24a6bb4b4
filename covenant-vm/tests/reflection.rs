//! The reflective surface: bytecode parameters, prefix introspection and
//! nested evaluation.

use covenant_vm::prelude::*;

fn base() -> Library<()> {
    Library::<()>::base()
}

#[test]
fn nested_eval_of_a_parsed_argument() {
    let lib = base();
    // Scenario: dig the `from` operand out of a compiled `slice` call and
    // evaluate it on its own.
    let inner = lib.must_compile("slice(0x01020304, 1, 2)");
    let source = format!(
        "eval(parseArgumentBytecode(0x{}, #slice, 1))",
        hex::encode(&inner.bytecode)
    );
    let value = lib.must_eval_from_source(&GlobalData::unit(), &source, &[]);
    assert_eq!(value, vec![0x01]);
}

#[test]
fn prefix_mismatch_and_bad_index_panic() {
    let lib = base();
    let inner = lib.must_compile("slice(0x01020304, 1, 2)");
    let glb = GlobalData::unit();

    let err = lib
        .eval_from_source(
            &glb,
            &format!(
                "parseArgumentBytecode(0x{}, #byte, 1)",
                hex::encode(&inner.bytecode)
            ),
            &[],
        )
        .unwrap_err();
    assert!(matches!(err, Error::Exec(ExecError::Panic(_))));

    let err = lib
        .eval_from_source(
            &glb,
            &format!(
                "parseArgumentBytecode(0x{}, #slice, 3)",
                hex::encode(&inner.bytecode)
            ),
            &[],
        )
        .unwrap_err();
    assert!(matches!(err, Error::Exec(ExecError::Panic(_))));
}

#[test]
fn prefix_and_inline_data_introspection() {
    let lib = base();
    let glb = GlobalData::unit();

    // The prefix of a short call is its single opcode byte.
    let inner = lib.must_compile("slice(0x0102, 0, 1)");
    let prefix = lib.must_eval_from_source(
        &glb,
        &format!("parsePrefixBytecode(0x{})", hex::encode(&inner.bytecode)),
        &[],
    );
    assert_eq!(prefix, lib.call_prefix("slice", 3).unwrap());

    // Inline data unwraps to its payload.
    let payload = lib.must_eval_from_source(&glb, "parseInlineData(0x82beef)", &[]);
    assert_eq!(payload, vec![0xbe, 0xef]);

    // Non-data bytecode is a panic, not an empty result.
    let err = lib
        .eval_from_source(
            &glb,
            &format!("parseInlineData(0x{})", hex::encode(&inner.bytecode)),
            &[],
        )
        .unwrap_err();
    assert!(matches!(err, Error::Exec(ExecError::Panic(_))));
}

#[test]
fn bytecode_parameters_feed_reflection() {
    let mut lib = base();
    // A constraint that requires its argument to be *literally* a call to
    // `concat` and then evaluates the first piece: the pattern used to
    // inspect unlock scripts.
    lib.extend(
        "firstPiece",
        "eval(parseArgumentBytecode($$0, parsePrefixBytecode($$0), 0))",
        None,
    )
    .unwrap();

    let glb = GlobalData::unit();
    let value = lib.must_eval_from_source(&glb, "firstPiece(concat(7, 8, 9))", &[]);
    assert_eq!(value, vec![7]);
}

#[test]
fn eval_requires_a_closed_expression() {
    let lib = base();
    let open = lib.must_compile("add($0, 1)");
    let err = lib
        .eval_from_source(
            &GlobalData::unit(),
            &format!("eval(0x{})", hex::encode(&open.bytecode)),
            &[],
        )
        .unwrap_err();
    assert!(matches!(err, Error::Exec(ExecError::Panic(_))));
}

#[test]
fn eval_runs_decoder_errors_through_the_panic_surface() {
    let lib = base();
    // 0x3f is an unallocated opcode.
    let err = lib
        .eval_from_source(&GlobalData::unit(), "eval(0x3f)", &[])
        .unwrap_err();
    assert!(matches!(err, Error::Exec(ExecError::Decode(_))));
}

#[test]
fn one_level_blobs_reassemble_for_every_shape() {
    let lib = base();
    for source in [
        "nil",
        "42",
        "0xdeadbeef",
        "concat(1, concat(2, 3), 0xbeef)",
        "slice($0, 0, byte($1, 0))",
        "blake2b(repeat(0x00, 32))",
    ] {
        let compiled = lib.must_compile(source);
        let one = lib.parse_one_level(&compiled.bytecode).unwrap();
        let mut reassembled = one.prefix.clone();
        for arg in &one.args {
            reassembled.extend_from_slice(arg);
        }
        assert_eq!(reassembled, compiled.bytecode, "source: {source}");
    }
}

#[test]
fn compose_one_level_round_trips_through_the_compiler() {
    let lib = base();
    let compiled = lib.must_compile("concat(7, 0xbeef, concat(1, 2))");
    let one = lib.parse_one_level(&compiled.bytecode).unwrap();
    let source = compose_one_level(&one.sym, &one.args);
    assert_eq!(lib.must_compile(&source).bytecode, compiled.bytecode);
}
