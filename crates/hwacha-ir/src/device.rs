// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Kernel arguments supplied by the host.

use crate::ScalarType;

/// A formal parameter of a device kernel.
///
/// For buffers `ty` is the element type; the parameter itself is a
/// byte-addressed pointer. Argument order is part of the launch contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceArgument {
    pub name: String,
    pub ty: ScalarType,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_buffer: bool,
}

impl DeviceArgument {
    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        DeviceArgument { name: name.into(), ty, is_buffer: false }
    }

    pub fn buffer(name: impl Into<String>, elem_ty: ScalarType) -> Self {
        DeviceArgument { name: name.into(), ty: elem_ty, is_buffer: true }
    }
}
