// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Hwacha overrides of the generic handler table.
//!
//! Lane loops map onto lane-index intrinsics. Device code cannot allocate
//! memory or abort, so allocation, free, and assertions are rejected.
//! Loads, stores, and calls keep their generic lowering.

use hwacha_ir::{Stmt, StmtKind};
use tracing::trace;

use crate::dispatch::HandlerTable;
use crate::emitter::{Binding, DeviceKernelEmitter, FunctionContext};
use crate::lane::{self, IntrinsicId};
use crate::scope::SymbolScope;
use crate::{generic, CodegenError, CodegenResult};

pub(crate) fn install(table: &mut HandlerTable) {
    table.set_stmt(StmtKind::For, lower_for);
    table.set_stmt(StmtKind::Allocate, reject);
    table.set_stmt(StmtKind::Free, reject);
    table.set_stmt(StmtKind::Assert, reject);
}

/// Lane loops become lane-index reads (thread x) or outlined calls
/// (block x). Every other loop is an ordinary serial loop.
fn lower_for(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    stmt: &Stmt,
) -> CodegenResult<()> {
    let Stmt::For { name, min, body, .. } = stmt else {
        return Err(CodegenError::InvariantViolation(format!(
            "for handler called with {:?}",
            stmt.kind()
        )));
    };
    if lane::classify(name).is_none() {
        return generic::stmt::lower_for(em, cx, scope, stmt);
    }
    let intrinsic = lane::resolve(name).map_err(|e| match e {
        CodegenError::UnsupportedConstruct(msg) => {
            CodegenError::UnsupportedConstruct(format!("{} (kernel '{}')", msg, cx.name))
        }
        other => other,
    })?;
    if !min.is_const_zero() {
        return Err(CodegenError::InvariantViolation(format!(
            "lane loop '{}' in '{}' must start at 0, found {}",
            name, cx.name, min
        )));
    }

    match intrinsic {
        IntrinsicId::BlockIdX => {
            let callee = em.outline(scope, cx, name, min.ty(), body)?;
            let forwarded = cx.params.clone();
            em.emit_call(cx, callee, &forwarded)?;
            Ok(())
        }
        IntrinsicId::ThreadIdX => {
            trace!(kernel = %cx.name, var = %name, "binding thread lane");
            let index = em.lane_index(cx, intrinsic, min.ty())?;
            let mut scope = scope.bind([cx.bind(name, index)]);
            em.emit_stmt(cx, &mut scope, body)
        }
    }
}

fn reject(
    _em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    _scope: &mut SymbolScope<Binding>,
    stmt: &Stmt,
) -> CodegenResult<()> {
    let what = match stmt {
        Stmt::Allocate { name, .. } => format!("allocation of '{}'", name),
        Stmt::Free { name } => format!("free of '{}'", name),
        Stmt::Assert { condition, .. } => format!("assertion '{}'", condition),
        other => format!("{:?} statement", other.kind()),
    };
    Err(CodegenError::UnsupportedConstruct(format!(
        "{} inside hwacha kernel '{}'",
        what, cx.name
    )))
}
