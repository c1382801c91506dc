// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Expression lowering.
//!
//! Booleans are `i8` values holding 0 or 1. Integer signedness comes from
//! the IR type and picks the instruction (`sdiv`/`udiv`, `sextend`/`uextend`).

use cranelift::prelude::*;
use hwacha_ir::{BinOp, CallKind, CmpOp, Expr, LogicOp, ScalarType};

use crate::emitter::{Binding, DeviceKernelEmitter, FunctionContext};
use crate::scope::SymbolScope;
use crate::types::{mask_imm, scalar_to_cranelift_type};
use crate::{CodegenError, CodegenResult};

fn mismatch(expected: &str, expr: &Expr) -> CodegenError {
    CodegenError::InvariantViolation(format!("{} handler called with {:?}", expected, expr.kind()))
}

pub(crate) fn lower_imm(
    _em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    _scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let ins = cx.builder.ins();
    match *expr {
        Expr::IntImm { ty, value } => {
            let cl = scalar_to_cranelift_type(ty)?;
            let value = if ty.is_bool() { i64::from(value != 0) } else { value };
            Ok(ins.iconst(cl, mask_imm(cl, value)))
        }
        Expr::UIntImm { ty, value } => {
            let cl = scalar_to_cranelift_type(ty)?;
            let value = if ty.is_bool() { u64::from(value != 0) } else { value };
            Ok(ins.iconst(cl, mask_imm(cl, value as i64)))
        }
        Expr::FloatImm { ty: ScalarType::Float(32), value } => Ok(ins.f32const(value as f32)),
        Expr::FloatImm { ty: ScalarType::Float(64), value } => Ok(ins.f64const(value)),
        Expr::FloatImm { ty, .. } => Err(CodegenError::InvariantViolation(format!(
            "float immediate of non-float type {}",
            ty
        ))),
        _ => Err(mismatch("immediate", expr)),
    }
}

pub(crate) fn lower_var(
    _em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let Expr::Var { name, .. } = expr else {
        return Err(mismatch("var", expr));
    };
    cx.lookup(scope, name)
}

pub(crate) fn lower_cast(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let Expr::Cast { ty: to, value } = expr else {
        return Err(mismatch("cast", expr));
    };
    let from = value.ty();
    let v = em.emit_expr(cx, scope, value)?;
    convert(cx, v, from, *to)
}

/// Convert `v` of IR type `from` to `to`.
fn convert(cx: &mut FunctionContext<'_>, v: Value, from: ScalarType, to: ScalarType) -> CodegenResult<Value> {
    if from == to {
        return Ok(v);
    }
    let to_cl = scalar_to_cranelift_type(to)?;
    let from_cl = scalar_to_cranelift_type(from)?;
    if to.is_bool() {
        return Ok(if from_cl == types::F64 {
            let zero = cx.builder.ins().f64const(0.0);
            cx.builder.ins().fcmp(FloatCC::NotEqual, v, zero)
        } else if from_cl == types::F32 {
            let zero = cx.builder.ins().f32const(0.0);
            cx.builder.ins().fcmp(FloatCC::NotEqual, v, zero)
        } else {
            cx.builder.ins().icmp_imm(IntCC::NotEqual, v, 0)
        });
    }
    let ins = cx.builder.ins();
    let out = if from.is_float() && to.is_float() {
        if to_cl.bits() > from_cl.bits() {
            ins.fpromote(to_cl, v)
        } else {
            ins.fdemote(to_cl, v)
        }
    } else if from.is_float() {
        if to.is_signed() {
            ins.fcvt_to_sint_sat(to_cl, v)
        } else {
            ins.fcvt_to_uint_sat(to_cl, v)
        }
    } else if to.is_float() {
        if from.is_signed() {
            ins.fcvt_from_sint(to_cl, v)
        } else {
            ins.fcvt_from_uint(to_cl, v)
        }
    } else if to_cl.bits() > from_cl.bits() {
        if from.is_signed() {
            ins.sextend(to_cl, v)
        } else {
            ins.uextend(to_cl, v)
        }
    } else if to_cl.bits() < from_cl.bits() {
        ins.ireduce(to_cl, v)
    } else {
        // Same width, different signedness.
        v
    };
    Ok(out)
}

fn operands(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    a: &Expr,
    b: &Expr,
) -> CodegenResult<(Value, Value)> {
    if a.ty() != b.ty() {
        return Err(CodegenError::InvariantViolation(format!(
            "operand types differ in '{}': {} vs {}",
            cx.name,
            a.ty(),
            b.ty()
        )));
    }
    let a = em.emit_expr(cx, scope, a)?;
    let b = em.emit_expr(cx, scope, b)?;
    Ok((a, b))
}

pub(crate) fn lower_binary(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let Expr::Binary { op, a: lhs, b: rhs } = expr else {
        return Err(mismatch("binary", expr));
    };
    let ty = lhs.ty();
    if ty.is_bool() {
        return Err(CodegenError::InvariantViolation(format!(
            "arithmetic '{}' on bool in '{}'",
            op, cx.name
        )));
    }
    let (a, b) = operands(em, cx, scope, lhs, rhs)?;
    let ins = cx.builder.ins();
    let out = if ty.is_float() {
        match op {
            BinOp::Add => ins.fadd(a, b),
            BinOp::Sub => ins.fsub(a, b),
            BinOp::Mul => ins.fmul(a, b),
            BinOp::Div => ins.fdiv(a, b),
            BinOp::Min => ins.fmin(a, b),
            BinOp::Max => ins.fmax(a, b),
            BinOp::Mod => {
                // a - b * floor(a / b)
                let q = ins.fdiv(a, b);
                let q = cx.builder.ins().floor(q);
                let m = cx.builder.ins().fmul(q, b);
                cx.builder.ins().fsub(a, m)
            }
        }
    } else {
        let signed = ty.is_signed();
        match op {
            BinOp::Add => ins.iadd(a, b),
            BinOp::Sub => ins.isub(a, b),
            BinOp::Mul => ins.imul(a, b),
            BinOp::Div if signed => ins.sdiv(a, b),
            BinOp::Div => ins.udiv(a, b),
            BinOp::Mod if signed => ins.srem(a, b),
            BinOp::Mod => ins.urem(a, b),
            BinOp::Min if signed => ins.smin(a, b),
            BinOp::Min => ins.umin(a, b),
            BinOp::Max if signed => ins.smax(a, b),
            BinOp::Max => ins.umax(a, b),
        }
    };
    Ok(out)
}

pub(crate) fn lower_cmp(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let Expr::Cmp { op, a: lhs, b: rhs } = expr else {
        return Err(mismatch("compare", expr));
    };
    let ty = lhs.ty();
    let (a, b) = operands(em, cx, scope, lhs, rhs)?;
    let out = if ty.is_float() {
        let cc = match op {
            CmpOp::Eq => FloatCC::Equal,
            CmpOp::Ne => FloatCC::NotEqual,
            CmpOp::Lt => FloatCC::LessThan,
            CmpOp::Le => FloatCC::LessThanOrEqual,
            CmpOp::Gt => FloatCC::GreaterThan,
            CmpOp::Ge => FloatCC::GreaterThanOrEqual,
        };
        cx.builder.ins().fcmp(cc, a, b)
    } else {
        let signed = ty.is_signed();
        let cc = match op {
            CmpOp::Eq => IntCC::Equal,
            CmpOp::Ne => IntCC::NotEqual,
            CmpOp::Lt if signed => IntCC::SignedLessThan,
            CmpOp::Lt => IntCC::UnsignedLessThan,
            CmpOp::Le if signed => IntCC::SignedLessThanOrEqual,
            CmpOp::Le => IntCC::UnsignedLessThanOrEqual,
            CmpOp::Gt if signed => IntCC::SignedGreaterThan,
            CmpOp::Gt => IntCC::UnsignedGreaterThan,
            CmpOp::Ge if signed => IntCC::SignedGreaterThanOrEqual,
            CmpOp::Ge => IntCC::UnsignedGreaterThanOrEqual,
        };
        cx.builder.ins().icmp(cc, a, b)
    };
    Ok(out)
}

pub(crate) fn lower_logic(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let Expr::Logic { op, a: lhs, b: rhs } = expr else {
        return Err(mismatch("logic", expr));
    };
    expect_bool(cx, lhs)?;
    let (a, b) = operands(em, cx, scope, lhs, rhs)?;
    Ok(match op {
        LogicOp::And => cx.builder.ins().band(a, b),
        LogicOp::Or => cx.builder.ins().bor(a, b),
    })
}

pub(crate) fn lower_not(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let Expr::Not { a } = expr else {
        return Err(mismatch("not", expr));
    };
    expect_bool(cx, a)?;
    let a = em.emit_expr(cx, scope, a)?;
    Ok(cx.builder.ins().bxor_imm(a, 1))
}

fn expect_bool(cx: &FunctionContext<'_>, e: &Expr) -> CodegenResult<()> {
    if e.ty().is_bool() {
        Ok(())
    } else {
        Err(CodegenError::InvariantViolation(format!(
            "expected bool in '{}', found {} for {}",
            cx.name,
            e.ty(),
            e
        )))
    }
}

pub(crate) fn lower_select(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let Expr::Select { cond, then_value, else_value } = expr else {
        return Err(mismatch("select", expr));
    };
    expect_bool(cx, cond)?;
    let c = em.emit_expr(cx, scope, cond)?;
    let (t, e) = operands(em, cx, scope, then_value, else_value)?;
    Ok(cx.builder.ins().select(c, t, e))
}

pub(crate) fn lower_let(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let Expr::Let { name, value, body } = expr else {
        return Err(mismatch("let", expr));
    };
    let value = em.emit_expr(cx, scope, value)?;
    let mut scope = scope.bind([cx.bind(name, value)]);
    em.emit_expr(cx, &mut scope, body)
}

pub(crate) fn lower_load(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let Expr::Load { buffer, index, ty } = expr else {
        return Err(mismatch("load", expr));
    };
    let elem_ty = cx.buffer_arg(buffer)?.ty;
    if *ty != elem_ty {
        return Err(CodegenError::InvariantViolation(format!(
            "load of {} from {} buffer '{}'",
            ty, elem_ty, buffer
        )));
    }
    let cl = scalar_to_cranelift_type(*ty)?;
    let addr = element_address(em, cx, scope, buffer, index)?;
    Ok(cx.builder.ins().load(cl, MemFlags::trusted(), addr, 0))
}

/// `base + index * sizeof(elem)` for element `index` of buffer argument `buffer`.
pub(crate) fn element_address(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    buffer: &str,
    index: &Expr,
) -> CodegenResult<Value> {
    let arg = cx.buffer_arg(buffer)?;
    let elem_bytes = i64::from(arg.ty.bytes());
    let index_ty = index.ty();
    if !index_ty.is_int() {
        return Err(CodegenError::InvariantViolation(format!(
            "index into '{}' must be an integer, found {}",
            buffer, index_ty
        )));
    }
    let base = cx.lookup(scope, buffer)?;
    let idx = em.emit_expr(cx, scope, index)?;
    let ptr_ty = em.module()?.pointer_type();
    let idx = if scalar_to_cranelift_type(index_ty)?.bits() < ptr_ty.bits() {
        if index_ty.is_signed() {
            cx.builder.ins().sextend(ptr_ty, idx)
        } else {
            cx.builder.ins().uextend(ptr_ty, idx)
        }
    } else {
        idx
    };
    let offset = cx.builder.ins().imul_imm(idx, elem_bytes);
    Ok(cx.builder.ins().iadd(base, offset))
}

pub(crate) fn lower_call(
    em: &mut DeviceKernelEmitter,
    cx: &mut FunctionContext<'_>,
    scope: &mut SymbolScope<Binding>,
    expr: &Expr,
) -> CodegenResult<Value> {
    let Expr::Call { name, args, ty, call_kind } = expr else {
        return Err(mismatch("call", expr));
    };
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(em.emit_expr(cx, scope, arg)?);
    }
    match call_kind {
        CallKind::PureIntrinsic => pure_intrinsic(cx, name, *ty, &values),
        CallKind::Extern => {
            let params = args
                .iter()
                .map(|a| scalar_to_cranelift_type(a.ty()))
                .collect::<CodegenResult<Vec<_>>>()?;
            let ret = scalar_to_cranelift_type(*ty)?;
            em.call_import(cx, name, &params, Some(ret), &values)?.ok_or_else(|| {
                CodegenError::InvariantViolation(format!("call to '{}' produced no value", name))
            })
        }
    }
}

fn pure_intrinsic(cx: &mut FunctionContext<'_>, name: &str, ty: ScalarType, args: &[Value]) -> CodegenResult<Value> {
    let ins = cx.builder.ins();
    match (name, args, ty.is_float()) {
        ("sqrt", &[x], true) => Ok(ins.sqrt(x)),
        ("abs", &[x], true) => Ok(ins.fabs(x)),
        ("abs", &[x], false) => Ok(ins.iabs(x)),
        ("floor", &[x], true) => Ok(ins.floor(x)),
        ("ceil", &[x], true) => Ok(ins.ceil(x)),
        ("trunc", &[x], true) => Ok(ins.trunc(x)),
        ("fma", &[a, b, c], true) => Ok(ins.fma(a, b, c)),
        _ => Err(CodegenError::UnsupportedConstruct(format!(
            "intrinsic '{}' with {} argument(s) of type {} in kernel '{}'",
            name,
            args.len(),
            ty,
            cx.name
        ))),
    }
}
