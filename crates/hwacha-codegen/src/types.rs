// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! ScalarType → Cranelift type translation.

use cranelift::prelude::*;
use hwacha_ir::{DeviceArgument, ScalarType};

use crate::{CodegenError, CodegenResult};

/// Translate an IR scalar type to its Cranelift value type.
/// Signedness lives in the instructions, not the type.
pub fn scalar_to_cranelift_type(ty: ScalarType) -> CodegenResult<Type> {
    match ty {
        ScalarType::Bool => Ok(types::I8),
        ScalarType::Int(8) | ScalarType::UInt(8) => Ok(types::I8),
        ScalarType::Int(16) | ScalarType::UInt(16) => Ok(types::I16),
        ScalarType::Int(32) | ScalarType::UInt(32) => Ok(types::I32),
        ScalarType::Int(64) | ScalarType::UInt(64) => Ok(types::I64),
        ScalarType::Float(32) => Ok(types::F32),
        ScalarType::Float(64) => Ok(types::F64),
        other => Err(CodegenError::InvariantViolation(format!(
            "no native type for scalar '{}'",
            other
        ))),
    }
}

/// Integer type of the given bit width.
pub fn int_type_of_width(bits: u32) -> CodegenResult<Type> {
    Type::int_with_byte_size((bits / 8) as u16).ok_or_else(|| {
        CodegenError::InvariantViolation(format!("no integer type of {} bits", bits))
    })
}

/// ABI type of a kernel parameter.
///
/// Buffers are byte pointers. Under the soft-float ABI a float scalar
/// travels in an integer register of the same width.
pub fn param_abi_type(arg: &DeviceArgument, pointer_ty: Type, soft_float: bool) -> CodegenResult<Type> {
    if arg.is_buffer {
        return Ok(pointer_ty);
    }
    abi_value_type(scalar_to_cranelift_type(arg.ty)?, soft_float)
}

/// Type a value of `ty` is passed or returned as across a call boundary.
pub fn abi_value_type(ty: Type, soft_float: bool) -> CodegenResult<Type> {
    if soft_float && ty.is_float() {
        int_type_of_width(ty.bits())
    } else {
        Ok(ty)
    }
}

/// Mask an immediate to the width of `ty`. Cranelift rejects `iconst`
/// immediates with bits set above the type width.
pub fn mask_imm(ty: Type, value: i64) -> i64 {
    match ty.bits() {
        64 => value,
        bits => value & ((1i64 << bits) - 1),
    }
}
