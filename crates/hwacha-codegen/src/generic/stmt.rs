// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Statement lowering.

use cranelift::prelude::*;
use hwacha_ir::Stmt;

use super::expr::element_address;
use crate::emitter::{Binding, DeviceKernelEmitter, FunctionContext};
use crate::scope::SymbolScope;
use crate::{CodegenError, CodegenResult};

fn mismatch(expected: &str, stmt: &Stmt) -> CodegenError {
    CodegenError::InvariantViolation(format!("{} handler called with {:?}", expected, stmt.kind()))
}

pub(crate) fn lower_let_stmt(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    stmt: &Stmt,
) -> CodegenResult<()> {
    let Stmt::LetStmt { name, value, body } = stmt else {
        return Err(mismatch("let", stmt));
    };
    let value = em.emit_expr(cx, scope, value)?;
    let mut scope = scope.bind([cx.bind(name, value)]);
    em.emit_stmt(cx, &mut scope, body)
}

pub(crate) fn lower_block(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    stmt: &Stmt,
) -> CodegenResult<()> {
    let Stmt::Block { stmts } = stmt else {
        return Err(mismatch("block", stmt));
    };
    for s in stmts {
        em.emit_stmt(cx, scope, s)?;
    }
    Ok(())
}

pub(crate) fn lower_if(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    stmt: &Stmt,
) -> CodegenResult<()> {
    let Stmt::IfThenElse { cond, then_case, else_case } = stmt else {
        return Err(mismatch("if", stmt));
    };
    let cond = em.emit_expr(cx, scope, cond)?;

    let then_block = cx.builder.create_block();
    let merge_block = cx.builder.create_block();
    let else_block = match else_case {
        Some(_) => cx.builder.create_block(),
        None => merge_block,
    };
    cx.builder.ins().brif(cond, then_block, &[], else_block, &[]);

    cx.builder.switch_to_block(then_block);
    em.emit_stmt(cx, scope, then_case)?;
    cx.builder.ins().jump(merge_block, &[]);

    if let Some(else_case) = else_case {
        cx.builder.switch_to_block(else_block);
        em.emit_stmt(cx, scope, else_case)?;
        cx.builder.ins().jump(merge_block, &[]);
    }

    cx.builder.switch_to_block(merge_block);
    Ok(())
}

/// Serial loop over `[min, min + extent)`.
///
/// ```text
///   jump header(min)
/// header(i):
///   brif i < end, body, exit
/// body:
///   ...; jump header(i + 1)
/// exit:
/// ```
pub(crate) fn lower_for(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    stmt: &Stmt,
) -> CodegenResult<()> {
    let Stmt::For { name, min, extent, body, .. } = stmt else {
        return Err(mismatch("for", stmt));
    };
    let ty = min.ty();
    if !ty.is_int() || extent.ty() != ty {
        return Err(CodegenError::InvariantViolation(format!(
            "loop '{}' bounds must share one integer type, found {} and {}",
            name,
            ty,
            extent.ty()
        )));
    }
    let start = em.emit_expr(cx, scope, min)?;
    let extent = em.emit_expr(cx, scope, extent)?;
    let end = cx.builder.ins().iadd(start, extent);
    let index_ty = cx.builder.func.dfg.value_type(start);

    let header = cx.builder.create_block();
    let body_block = cx.builder.create_block();
    let exit = cx.builder.create_block();
    cx.builder.append_block_param(header, index_ty);

    cx.builder.ins().jump(header, &[start]);

    cx.builder.switch_to_block(header);
    let index = cx.builder.block_params(header)[0];
    let cc = if ty.is_signed() { IntCC::SignedLessThan } else { IntCC::UnsignedLessThan };
    let more = cx.builder.ins().icmp(cc, index, end);
    cx.builder.ins().brif(more, body_block, &[], exit, &[]);

    cx.builder.switch_to_block(body_block);
    {
        let mut scope = scope.bind([cx.bind(name, index)]);
        em.emit_stmt(cx, &mut scope, body)?;
    }
    let next = cx.builder.ins().iadd_imm(index, 1);
    cx.builder.ins().jump(header, &[next]);

    cx.builder.switch_to_block(exit);
    Ok(())
}

pub(crate) fn lower_store(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    stmt: &Stmt,
) -> CodegenResult<()> {
    let Stmt::Store { buffer, value, index } = stmt else {
        return Err(mismatch("store", stmt));
    };
    let elem_ty = cx.buffer_arg(buffer)?.ty;
    if value.ty() != elem_ty {
        return Err(CodegenError::InvariantViolation(format!(
            "store of {} into {} buffer '{}'",
            value.ty(),
            elem_ty,
            buffer
        )));
    }
    let value = em.emit_expr(cx, scope, value)?;
    let addr = element_address(em, cx, scope, buffer, index)?;
    cx.builder.ins().store(MemFlags::trusted(), value, addr, 0);
    Ok(())
}

pub(crate) fn lower_evaluate(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    stmt: &Stmt,
) -> CodegenResult<()> {
    let Stmt::Evaluate { value } = stmt else {
        return Err(mismatch("evaluate", stmt));
    };
    em.emit_expr(cx, scope, value)?;
    Ok(())
}
