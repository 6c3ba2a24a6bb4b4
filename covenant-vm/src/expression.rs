//! The executable expression tree produced by the decoder.

use std::ops::Range;
use std::sync::Arc;

use covenant_asm::{data_atom, Opcode};

use crate::local::LocalFn;

/// A slice of immutable bytecode: the shared buffer plus the byte range one
/// tree node was decoded from. Cheap to clone; the buffer is never copied.
#[derive(Debug, Clone)]
pub struct BytecodeRef {
    bytes: Arc<[u8]>,
    range: Range<usize>,
}

impl BytecodeRef {
    pub(crate) fn new(bytes: Arc<[u8]>, range: Range<usize>) -> Self {
        Self { bytes, range }
    }

    /// The referenced bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[self.range.clone()]
    }
}

impl AsRef<[u8]> for BytecodeRef {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// One node of an executable expression tree: inline data, a library call,
/// or a local-library call. Immutable once decoded; all per-evaluation
/// state (argument memoization, parameter scopes) lives in the evaluator.
#[derive(Debug, Clone)]
pub struct Expression {
    pub(crate) kind: ExprKind,
    pub(crate) bytecode: Option<BytecodeRef>,
}

#[derive(Debug, Clone)]
pub(crate) enum ExprKind {
    /// Inline data: evaluation returns the payload.
    Data(Vec<u8>),
    /// A call into the library, parameter references included.
    Call {
        opcode: Opcode,
        sym: Arc<str>,
        args: Vec<Expression>,
    },
    /// A call into a local-library slot resolved at decode time.
    LocalCall {
        fun: Arc<LocalFn>,
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Wraps a host-provided byte slice as an inline-data node. When the
    /// payload fits an inline atom the node also carries synthesized
    /// bytecode, so `$$i` works on top-level arguments of moderate size.
    pub(crate) fn data(payload: &[u8]) -> Self {
        let bytecode = data_atom(payload)
            .ok()
            .map(|atom| BytecodeRef::new(Arc::from(atom), 0..payload.len() + 1));
        Self {
            kind: ExprKind::Data(payload.to_vec()),
            bytecode,
        }
    }

    /// The bytecode this node was decoded from, when known.
    pub fn bytecode(&self) -> Option<&[u8]> {
        self.bytecode.as_ref().map(BytecodeRef::as_slice)
    }

    /// Number of argument sub-trees.
    pub fn num_args(&self) -> usize {
        match &self.kind {
            ExprKind::Data(_) => 0,
            ExprKind::Call { args, .. } | ExprKind::LocalCall { args, .. } => args.len(),
        }
    }

    /// The human symbol of a call node; `None` for inline data.
    pub fn symbol(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Data(_) => None,
            ExprKind::Call { sym, .. } => Some(sym),
            ExprKind::LocalCall { fun, .. } => Some(fun.symbol()),
        }
    }
}
