//! The evaluator: a single-threaded, call-by-need tree walker.
//!
//! Each call site wraps its argument sub-trees in [`ArgSlot`] records; a
//! slot is evaluated at most once per enclosing call and its bytes are
//! cached, which is what makes `if`, the logical short-circuits and
//! repeated `$i` references cheap. The slots of a call become the variable
//! scope of the callee when the callee is an extended or local function, so
//! memoization is shared between the caller's laziness and the callee's
//! parameter accesses.
//!
//! Evaluation errors are the language's panics: every operation returns
//! `Result` and a failure unwinds the whole top-level evaluation. Scopes
//! are stack-allocated and linked by reference, so the walker needs no
//! heap-resident frames.

use std::cell::RefCell;
use std::sync::Arc;

use crate::context::GlobalData;
use crate::error::{Error, ExecError, LibraryError};
use crate::expression::{ExprKind, Expression};
use crate::library::{FunImpl, Library};
use crate::local::LocalFn;

use covenant_asm::Opcode;

/// Shared state of one top-level evaluation.
pub(crate) struct EvalContext<'g, T> {
    pub(crate) lib: &'g Library<T>,
    pub(crate) glb: &'g GlobalData<'g, T>,
}

// Not derived: only the references are copied, never `T`.
impl<T> Clone for EvalContext<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for EvalContext<'_, T> {}

/// The variable scope of a function body: the argument records of the
/// enclosing call, visible through `$i` / `$$i`.
pub(crate) struct Scope<'s> {
    slots: &'s [ArgSlot<'s>],
}

/// One argument of a call: the sub-tree, the scope it must be evaluated
/// in, and the memoized result of its first evaluation.
pub(crate) struct ArgSlot<'s> {
    expr: &'s Expression,
    scope: &'s Scope<'s>,
    cache: RefCell<Option<Vec<u8>>>,
}

impl<'s> ArgSlot<'s> {
    pub(crate) fn new(expr: &'s Expression, scope: &'s Scope<'s>) -> Self {
        Self {
            expr,
            scope,
            cache: RefCell::new(None),
        }
    }

    fn eval<T>(&self, ctx: &EvalContext<'_, T>) -> Result<Vec<u8>, ExecError> {
        if let Some(cached) = self.cache.borrow().as_ref() {
            return Ok(cached.clone());
        }
        let value = eval_node(ctx, self.expr, self.scope)?;
        *self.cache.borrow_mut() = Some(value.clone());
        Ok(value)
    }

    fn bytecode(&self) -> Option<&[u8]> {
        self.expr.bytecode()
    }
}

fn bind<'s>(args: &'s [Expression], scope: &'s Scope<'s>) -> Vec<ArgSlot<'s>> {
    args.iter().map(|arg| ArgSlot::new(arg, scope)).collect()
}

fn scope_slot<'s>(scope: &Scope<'s>, idx: u8, sym: &str) -> Result<&'s ArgSlot<'s>, ExecError> {
    scope.slots.get(idx as usize).ok_or_else(|| {
        ExecError::Panic(format!(
            "`{sym}`: parameter index {idx} outside the scope of {} arguments",
            scope.slots.len()
        ))
    })
}

pub(crate) fn eval_node<T>(
    ctx: &EvalContext<'_, T>,
    expr: &Expression,
    scope: &Scope<'_>,
) -> Result<Vec<u8>, ExecError> {
    match &expr.kind {
        ExprKind::Data(payload) => Ok(payload.clone()),
        ExprKind::Call { opcode, sym, args } => {
            let desc = ctx.lib.descriptor_by_opcode(*opcode).ok_or_else(|| {
                ExecError::Panic(format!("unknown opcode {opcode} behind `{sym}`"))
            })?;
            let value = match desc.fun() {
                FunImpl::EvalParam(i) => scope_slot(scope, *i, sym)?.eval(ctx),
                FunImpl::BytecodeParam(i) => {
                    let slot = scope_slot(scope, *i, sym)?;
                    slot.bytecode().map(<[u8]>::to_vec).ok_or_else(|| {
                        ExecError::Panic(format!("`{sym}`: argument bytecode is not available"))
                    })
                }
                FunImpl::Embedded(fun) => {
                    let slots = bind(args, scope);
                    let mut params = CallParams {
                        ctx: *ctx,
                        slots: &slots,
                        scope,
                        sym,
                    };
                    fun(&mut params)
                }
                FunImpl::Expression(body) => {
                    let slots = bind(args, scope);
                    let inner = Scope { slots: &slots };
                    eval_node(ctx, body, &inner)
                }
            }?;
            if ctx.glb.trace_enabled() {
                ctx.glb
                    .put_trace(&format!("{sym} -> 0x{}", hex::encode(&value)));
            }
            Ok(value)
        }
        ExprKind::LocalCall { fun, args } => {
            let slots = bind(args, scope);
            let inner = Scope { slots: &slots };
            eval_node(ctx, fun.body(), &inner)
        }
    }
}

/// Argument accessor handed to embedded implementations.
///
/// `arg` evaluates lazily and memoizes; `eval_param` / `param_bytecode`
/// reach into the *enclosing* variable scope and are only meaningful inside
/// host implementations that stand in for extended functions.
pub struct CallParams<'a, T> {
    ctx: EvalContext<'a, T>,
    slots: &'a [ArgSlot<'a>],
    scope: &'a Scope<'a>,
    sym: &'a str,
}

impl<'a, T> CallParams<'a, T> {
    /// Number of arguments passed at this call site.
    pub fn arity(&self) -> u8 {
        self.slots.len() as u8
    }

    /// Symbol of the function being executed.
    pub fn sym(&self) -> &str {
        self.sym
    }

    /// Evaluates argument `n`, memoizing the result for any later access.
    pub fn arg(&self, n: usize) -> Result<Vec<u8>, ExecError> {
        let slot = self
            .slots
            .get(n)
            .ok_or_else(|| self.panic(format!("argument index {n} out of range")))?;
        slot.eval(&self.ctx)
    }

    /// Evaluates entry `i` of the enclosing variable scope (`$i`).
    pub fn eval_param(&self, i: u8) -> Result<Vec<u8>, ExecError> {
        scope_slot(self.scope, i, self.sym)?.eval(&self.ctx)
    }

    /// The bytecode of entry `i` of the enclosing variable scope (`$$i`).
    pub fn param_bytecode(&self, i: u8) -> Result<Vec<u8>, ExecError> {
        let slot = scope_slot(self.scope, i, self.sym)?;
        slot.bytecode()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| self.panic("parameter bytecode is not available"))
    }

    /// The opaque host data.
    pub fn data_context(&self) -> &T {
        self.ctx.glb.data()
    }

    /// Copies bytes into an owned buffer whose lifetime outlives this call.
    pub fn alloc_data(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    /// The library this evaluation runs against.
    pub fn library(&self) -> &Library<T> {
        self.ctx.lib
    }

    /// Records a trace message; the closure runs only when tracing is on.
    pub fn trace(&self, message: impl FnOnce() -> String) {
        if self.ctx.glb.trace_enabled() {
            self.ctx.glb.put_trace(&message());
        }
    }

    /// Builds the evaluation panic for this call site, recording it in the
    /// trace. The caller returns it as `Err` to unwind.
    pub fn panic(&self, msg: impl AsRef<str>) -> ExecError {
        let msg = format!("{}: {}", self.sym, msg.as_ref());
        self.ctx.glb.put_trace(&msg);
        ExecError::Panic(msg)
    }

    /// A panic carrying exactly `msg`, without the symbol prefix. Used by
    /// `fail`, whose message is script-controlled.
    pub fn panic_verbatim(&self, msg: String) -> ExecError {
        self.ctx.glb.put_trace(&msg);
        ExecError::Panic(msg)
    }

    /// Evaluates a decoded expression with an empty variable scope.
    pub(crate) fn eval_closed(&self, expr: &Expression) -> Result<Vec<u8>, ExecError> {
        let empty = Scope { slots: &[] };
        eval_node(&self.ctx, expr, &empty)
    }

    /// Dispatches into a local function, binding this call's arguments
    /// from `skip` onwards as the callee's scope.
    pub(crate) fn call_local(&self, fun: &LocalFn, skip: usize) -> Result<Vec<u8>, ExecError> {
        let scope = Scope {
            slots: &self.slots[skip..],
        };
        eval_node(&self.ctx, fun.body(), &scope)
    }
}

impl<T> Library<T> {
    /// Evaluates an already-decoded expression. `args` are bound as
    /// `$0..$n-1` of the top-level scope.
    pub fn eval_expression(
        &self,
        glb: &GlobalData<'_, T>,
        expr: &Expression,
        args: &[&[u8]],
    ) -> Result<Vec<u8>, ExecError> {
        if args.len() > Opcode::MAX_PARAMETERS as usize {
            return Err(ExecError::Panic(format!(
                "{} top-level arguments exceed the maximum of 15",
                args.len()
            )));
        }
        let arg_exprs: Vec<Expression> = args.iter().map(|a| Expression::data(a)).collect();
        let empty = Scope { slots: &[] };
        let slots: Vec<ArgSlot<'_>> = arg_exprs.iter().map(|e| ArgSlot::new(e, &empty)).collect();
        let scope = Scope { slots: &slots };
        let ctx = EvalContext { lib: self, glb };
        eval_node(&ctx, expr, &scope)
    }

    /// Decodes and evaluates bytecode.
    pub fn eval_from_bytecode(
        &self,
        glb: &GlobalData<'_, T>,
        code: &[u8],
        args: &[&[u8]],
    ) -> Result<Vec<u8>, Error> {
        let (expr, num_params) = self.decode_expression(code)?;
        if args.len() < num_params as usize {
            return Err(ExecError::Panic(format!(
                "expression expects {num_params} arguments, got {}",
                args.len()
            ))
            .into());
        }
        Ok(self.eval_expression(glb, &expr, args)?)
    }

    /// Compiles and evaluates source text.
    pub fn eval_from_source(
        &self,
        glb: &GlobalData<'_, T>,
        source: &str,
        args: &[&[u8]],
    ) -> Result<Vec<u8>, Error> {
        let compiled = self.compile_expression(source)?;
        self.eval_from_bytecode(glb, &compiled.bytecode, args)
    }

    /// Panicking counterpart of [`Library::eval_from_source`].
    pub fn must_eval_from_source(
        &self,
        glb: &GlobalData<'_, T>,
        source: &str,
        args: &[&[u8]],
    ) -> Vec<u8> {
        self.eval_from_source(glb, source, args)
            .expect("expression evaluates")
    }

    /// Evaluates a library function by name, embedded or extended, binding
    /// `args` as its arguments.
    pub fn eval_from_library(
        &self,
        glb: &GlobalData<'_, T>,
        sym: &str,
        args: &[&[u8]],
    ) -> Result<Vec<u8>, Error> {
        let desc = self
            .descriptor(sym)
            .ok_or_else(|| LibraryError::UnknownSymbol(sym.to_string()))?;
        if args.len() > Opcode::MAX_PARAMETERS as usize
            || !desc.arity().accepts(args.len() as u8)
        {
            return Err(LibraryError::ArityMismatch {
                sym: sym.to_string(),
                expected: desc.arity().to_string(),
                got: args.len().min(u8::MAX as usize) as u8,
            }
            .into());
        }
        let call = Expression {
            kind: ExprKind::Call {
                opcode: desc.opcode(),
                sym: Arc::from(sym),
                args: args.iter().map(|a| Expression::data(a)).collect(),
            },
            bytecode: None,
        };
        Ok(self.eval_expression(glb, &call, &[])?)
    }

    /// Panicking counterpart of [`Library::eval_from_bytecode`].
    pub fn must_eval_from_bytecode(
        &self,
        glb: &GlobalData<'_, T>,
        code: &[u8],
        args: &[&[u8]],
    ) -> Vec<u8> {
        self.eval_from_bytecode(glb, code, args)
            .expect("bytecode evaluates")
    }

    /// Panicking counterpart of [`Library::eval_from_library`].
    pub fn must_eval_from_library(
        &self,
        glb: &GlobalData<'_, T>,
        sym: &str,
        args: &[&[u8]],
    ) -> Vec<u8> {
        self.eval_from_library(glb, sym, args)
            .expect("library function evaluates")
    }
}
