//! The library descriptor file: a YAML dump of every registry entry, in
//! opcode order, optionally carrying compiled bodies and the structural
//! hash. A loader reconstructs the library by iterating in file order;
//! embedded entries need the host to supply implementations by symbol, and
//! a compiled-mode file is rejected when the recomputed hash mismatches.

use serde::{Deserialize, Serialize};

use covenant_asm::{Opcode, OpcodeKind};

use crate::decoder;
use crate::error::LibraryError;
use crate::expression::Expression;
use crate::library::{Arity, FunDescriptor, FunImpl, Library};
use crate::ops::Embeddings;

use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
struct LibraryFile {
    hash: String,
    functions: Vec<FunRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FunRecord {
    sym: String,
    fun_code: u16,
    num_args: i16,
    embedded: bool,
    short: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bytecode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

fn bad_record(sym: &str, reason: impl Into<String>) -> LibraryError {
    LibraryError::BadRecord {
        sym: sym.to_string(),
        reason: reason.into(),
    }
}

impl<T> Library<T> {
    /// Serializes the registry. In `compiled` mode the file carries the
    /// structural hash and the bytecode of every extended body; otherwise
    /// it carries sources only and an empty hash.
    pub fn dump(&self, compiled: bool) -> Result<String, LibraryError> {
        let functions = self
            .functions()
            .map(|desc| FunRecord {
                sym: desc.sym().to_string(),
                fun_code: desc.opcode().to_u16(),
                num_args: match desc.arity() {
                    Arity::Fixed(k) => i16::from(k),
                    Arity::Vararg => -1,
                },
                embedded: desc.is_embedded(),
                short: desc.is_short(),
                bytecode: compiled
                    .then(|| desc.bytecode().map(hex::encode))
                    .flatten(),
                source: desc.source().map(str::to_string),
                description: desc.description().map(str::to_string),
            })
            .collect();
        let file = LibraryFile {
            hash: if compiled {
                hex::encode(self.library_hash())
            } else {
                String::new()
            },
            functions,
        };
        serde_yaml::to_string(&file).map_err(|e| LibraryError::Yaml(e.to_string()))
    }

    /// Reconstructs a library from a descriptor file. `embeddings` supplies
    /// the native implementation for every embedded symbol in the file
    /// (see [`crate::ops::base_embeddings`] for the stock set).
    pub fn load(yaml: &str, embeddings: &Embeddings<T>) -> Result<Self, LibraryError> {
        let file: LibraryFile =
            serde_yaml::from_str(yaml).map_err(|e| LibraryError::Yaml(e.to_string()))?;

        let mut lib = Self::bare();
        for record in &file.functions {
            let opcode = Opcode::new(record.fun_code);
            if lib.descriptor_by_opcode(opcode).is_some() {
                return Err(bad_record(&record.sym, "duplicate opcode"));
            }
            if record.short != opcode.is_short() {
                return Err(bad_record(&record.sym, "short flag contradicts the opcode"));
            }
            let arity = match record.num_args {
                -1 => Arity::Vararg,
                n if (0..=i16::from(Opcode::MAX_PARAMETERS)).contains(&n) => {
                    Arity::Fixed(n as u8)
                }
                n => return Err(bad_record(&record.sym, format!("illegal arity {n}"))),
            };

            let (arity, fun, bytecode, source) = match opcode.kind() {
                OpcodeKind::EvalParam(i) => {
                    (Arity::Fixed(0), FunImpl::EvalParam(i), None, None)
                }
                OpcodeKind::BytecodeParam(i) => {
                    (Arity::Fixed(0), FunImpl::BytecodeParam(i), None, None)
                }
                OpcodeKind::ShortFun | OpcodeKind::LongFun => {
                    if !record.embedded {
                        return Err(bad_record(&record.sym, "extended entry in an embedded range"));
                    }
                    if opcode.is_short() && arity == Arity::Vararg {
                        return Err(bad_record(&record.sym, "vararg short function"));
                    }
                    let fun = embeddings
                        .get(&record.sym)
                        .copied()
                        .ok_or_else(|| LibraryError::MissingEmbedding(record.sym.clone()))?;
                    (arity, FunImpl::Embedded(fun), None, None)
                }
                OpcodeKind::ExtendedFun => {
                    if record.embedded {
                        return Err(bad_record(&record.sym, "embedded entry in the extended range"));
                    }
                    let (bytecode, body, num_params) =
                        load_extended_body(&lib, record)?;
                    if Arity::Fixed(num_params) != arity {
                        return Err(bad_record(
                            &record.sym,
                            format!("recorded arity {arity} contradicts body arity {num_params}"),
                        ));
                    }
                    (
                        arity,
                        FunImpl::Expression(Arc::new(body)),
                        Some(bytecode),
                        record.source.clone(),
                    )
                }
                OpcodeKind::LocalMarker | OpcodeKind::LocalFun(_) | OpcodeKind::Invalid => {
                    return Err(bad_record(&record.sym, "opcode outside the registry ranges"))
                }
            };

            lib.insert(FunDescriptor {
                sym: Arc::from(record.sym.as_str()),
                opcode,
                arity,
                bytecode,
                source,
                description: record.description.clone(),
                fun,
            })?;
        }

        if !file.hash.is_empty() {
            let computed = hex::encode(lib.library_hash());
            if computed != file.hash {
                return Err(LibraryError::HashMismatch {
                    recorded: file.hash,
                    computed,
                });
            }
        }
        Ok(lib)
    }
}

fn load_extended_body<T>(
    lib: &Library<T>,
    record: &FunRecord,
) -> Result<(Vec<u8>, Expression, u8), LibraryError> {
    if let Some(hex_body) = &record.bytecode {
        let bytecode = hex::decode(hex_body)
            .map_err(|_| bad_record(&record.sym, "bytecode is not valid hex"))?;
        let (body, num_params) = decoder::decode_with_local(lib, None, &bytecode)?;
        return Ok((bytecode, body, num_params));
    }
    let source = record
        .source
        .as_deref()
        .ok_or_else(|| bad_record(&record.sym, "neither bytecode nor source present"))?;
    let compiled = crate::compiler::compile_with_local(lib, None, source)?;
    let (body, num_params) = decoder::decode_with_local(lib, None, &compiled.bytecode)?;
    Ok((compiled.bytecode, body, num_params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GlobalData;
    use crate::ops::base_embeddings;

    fn extended_lib() -> Library<()> {
        let mut lib = Library::<()>::base();
        lib.extend_many(
            "func double : add($0, $0)\nfunc isPair : equal(len($0), u64/2)",
        )
        .unwrap();
        lib
    }

    #[test]
    fn compiled_dump_load_round_trip_preserves_the_hash() {
        let lib = extended_lib();
        let dump = lib.dump(true).unwrap();
        let loaded = Library::<()>::load(&dump, &base_embeddings()).unwrap();
        assert_eq!(loaded.library_hash(), lib.library_hash());
        assert_eq!(loaded.num_extended(), 2);

        // The reconstructed library behaves identically.
        let glb = GlobalData::unit();
        assert_eq!(
            loaded.must_eval_from_source(&glb, "double(21)", &[]),
            42u64.to_be_bytes()
        );
    }

    #[test]
    fn source_mode_dump_reconstructs_an_equivalent_library() {
        let lib = extended_lib();
        let dump = lib.dump(false).unwrap();
        assert!(dump.contains("hash: ''"));
        let loaded = Library::<()>::load(&dump, &base_embeddings()).unwrap();
        assert_eq!(loaded.library_hash(), lib.library_hash());
    }

    #[test]
    fn tampered_hash_is_rejected() {
        let lib = extended_lib();
        let dump = lib.dump(true).unwrap();
        let recorded = hex::encode(lib.library_hash());
        let mut tampered_hash = recorded.clone();
        tampered_hash.replace_range(0..2, if recorded.starts_with("00") { "11" } else { "00" });
        let tampered = dump.replace(&recorded, &tampered_hash);
        assert!(matches!(
            Library::<()>::load(&tampered, &base_embeddings()),
            Err(LibraryError::HashMismatch { .. })
        ));
    }

    #[test]
    fn missing_embedded_implementations_are_reported() {
        let lib = extended_lib();
        let dump = lib.dump(true).unwrap();
        let err = Library::<()>::load(&dump, &Embeddings::new()).unwrap_err();
        assert!(matches!(err, LibraryError::MissingEmbedding(_)));
    }
}
