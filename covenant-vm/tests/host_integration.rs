//! Embedding the language the way a ledger does: opaque host data behind
//! custom embedded functions, constraints as extended functions, bytecode
//! as the transport form.

use covenant_vm::ops::base_embeddings;
use covenant_vm::prelude::*;

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::StdRng;
use rand::SeedableRng;

struct Output {
    amount: u64,
    owner: Vec<u8>,
}

struct TxContext {
    outputs: Vec<Output>,
    essence: Vec<u8>,
    signature: Vec<u8>,
}

fn output_index<T>(p: &CallParams<'_, T>) -> Result<usize, ExecError> {
    match p.arg(0)?.as_slice() {
        [idx] => Ok(*idx as usize),
        other => Err(p.panic(format!("output index must be one byte, got {}", other.len()))),
    }
}

fn output_amount(p: &mut CallParams<'_, TxContext>) -> Result<Vec<u8>, ExecError> {
    let idx = output_index(p)?;
    let output = p
        .data_context()
        .outputs
        .get(idx)
        .ok_or_else(|| p.panic(format!("no output at index {idx}")))?;
    Ok(output.amount.to_be_bytes().to_vec())
}

fn output_owner(p: &mut CallParams<'_, TxContext>) -> Result<Vec<u8>, ExecError> {
    let idx = output_index(p)?;
    let output = p
        .data_context()
        .outputs
        .get(idx)
        .ok_or_else(|| p.panic(format!("no output at index {idx}")))?;
    Ok(output.owner.clone())
}

fn tx_essence(p: &mut CallParams<'_, TxContext>) -> Result<Vec<u8>, ExecError> {
    Ok(p.data_context().essence.clone())
}

fn tx_signature(p: &mut CallParams<'_, TxContext>) -> Result<Vec<u8>, ExecError> {
    Ok(p.data_context().signature.clone())
}

const CONSTRAINTS: &str = "\
func minAmount : lessThan(uint8Bytes($1), outputAmount($0))
func ownedBy : validSignatureED25519(txEssence, txSignature, outputOwner($0))
func spendable : and(minAmount($0, $1), ownedBy($0))
";

fn ledger_lib() -> Library<TxContext> {
    let mut lib = Library::<TxContext>::base();
    lib.embed_long(
        "outputAmount",
        Arity::Fixed(1),
        output_amount,
        Some("amount of output $0 as 8 big-endian bytes"),
    )
    .unwrap();
    lib.embed_long(
        "outputOwner",
        Arity::Fixed(1),
        output_owner,
        Some("owner public key of output $0"),
    )
    .unwrap();
    lib.embed_long("txEssence", Arity::Fixed(0), tx_essence, Some("signed tx essence"))
        .unwrap();
    lib.embed_long("txSignature", Arity::Fixed(0), tx_signature, Some("tx signature"))
        .unwrap();
    lib.extend_many(CONSTRAINTS).unwrap();
    lib
}

fn signed_context(amount: u64) -> TxContext {
    let mut rng = StdRng::seed_from_u64(99);
    let key = SigningKey::generate(&mut rng);
    let essence = b"essence bytes".to_vec();
    let signature = key.sign(&essence).to_bytes().to_vec();
    TxContext {
        outputs: vec![Output {
            amount,
            owner: key.verifying_key().to_bytes().to_vec(),
        }],
        essence,
        signature,
    }
}

#[test]
fn constraints_gate_on_host_state() {
    let lib = ledger_lib();

    let rich = signed_context(5_000);
    let glb = GlobalData::new(&rich);
    assert_eq!(
        lib.must_eval_from_source(&glb, "spendable(0, u64/1000)", &[]),
        vec![0x01]
    );

    let poor = signed_context(100);
    let glb = GlobalData::new(&poor);
    assert_eq!(
        lib.must_eval_from_source(&glb, "spendable(0, u64/1000)", &[]),
        Vec::<u8>::new()
    );

    // A forged signature flips only the ownership leg.
    let mut forged = signed_context(5_000);
    forged.signature[0] ^= 0x01;
    let glb = GlobalData::new(&forged);
    assert_eq!(
        lib.must_eval_from_source(&glb, "minAmount(0, u64/1000)", &[]),
        vec![0x01]
    );
    assert_eq!(
        lib.must_eval_from_source(&glb, "ownedBy(0)", &[]),
        Vec::<u8>::new()
    );
}

#[test]
fn compiled_constraints_travel_as_bytecode() {
    let lib = ledger_lib();
    // The constraint is compiled once and inlined into the output record;
    // verification decodes and runs it against the spending transaction.
    let compiled = lib.must_compile("spendable(0, u64/1000)");

    let ctx = signed_context(5_000);
    let glb = GlobalData::new(&ctx);
    assert_eq!(
        lib.must_eval_from_bytecode(&glb, &compiled.bytecode, &[]),
        vec![0x01]
    );

    // Equal bytecode, equal program: the decompiled form names the same
    // constraint.
    assert_eq!(
        lib.decompile(&compiled.bytecode).unwrap(),
        "spendable(0,0x00000000000003e8)"
    );
}

#[test]
fn a_node_reconstructs_the_library_from_its_descriptor_file() {
    let lib = ledger_lib();
    let dump = lib.dump(true).unwrap();

    let mut embeddings = base_embeddings::<TxContext>();
    embeddings.insert("outputAmount".to_string(), output_amount as EmbeddedFn<TxContext>);
    embeddings.insert("outputOwner".to_string(), output_owner);
    embeddings.insert("txEssence".to_string(), tx_essence);
    embeddings.insert("txSignature".to_string(), tx_signature);

    let loaded = Library::<TxContext>::load(&dump, &embeddings).unwrap();
    assert_eq!(loaded.library_hash(), lib.library_hash());

    let ctx = signed_context(2_000);
    let glb = GlobalData::new(&ctx);
    assert_eq!(
        loaded.must_eval_from_source(&glb, "spendable(0, u64/1999)", &[]),
        vec![0x01]
    );
}
