//! Walks one expression through all three forms: source text, canonical
//! bytecode, and evaluation, then pokes at the bytecode reflectively.
//!
//! ```sh
//! cargo run --example covenant
//! ```

use covenant_vm::error::Error;
use covenant_vm::prelude::*;

fn main() -> Result<(), Error> {
    let mut lib = Library::<()>::base();
    lib.extend(
        "isTriple",
        "equal(len($0), u64/3)",
        Some("true when the argument is exactly three bytes"),
    )?;

    let glb = GlobalData::unit();

    // Source form.
    let source = "if(isTriple($0), 0x01, !!!wrong_size)";
    println!("source:     {source}");

    // Canonical transport form.
    let compiled = lib.compile_expression(source)?;
    println!("bytecode:   0x{}", hex::encode(&compiled.bytecode));
    println!("decompiled: {}", lib.decompile(&compiled.bytecode)?);

    // Evaluation, with the argument bound as $0.
    let ok = lib.eval_from_bytecode(&glb, &compiled.bytecode, &[b"abc"])?;
    println!("eval(abc):  0x{}", hex::encode(&ok));

    let err = lib
        .eval_from_bytecode(&glb, &compiled.bytecode, &[b"abcd"])
        .unwrap_err();
    println!("eval(abcd): {err}");

    // One level of reflection: split the call into prefix and argument
    // blobs that concatenate back to the original bytes.
    let one = lib.parse_one_level(&compiled.bytecode)?;
    println!(
        "one level:  {} with {} argument blobs, prefix 0x{}",
        one.sym,
        one.args.len(),
        hex::encode(&one.prefix)
    );

    // The library is content-addressable.
    println!("lib hash:   0x{}", hex::encode(lib.library_hash()));
    Ok(())
}
