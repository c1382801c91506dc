// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement/expression tree consumed by the Hwacha device lowering.
//!
//! This is the platform-independent IR handed to a device code generator:
//! loops whose variable names carry a lane suffix (`.__block_id_x`, ...)
//! are mapped onto hardware lanes, everything else is ordinary code.

pub mod types;
pub mod expr;
pub mod stmt;
pub mod device;
mod display;

pub use device::DeviceArgument;
pub use expr::{BinOp, CallKind, CmpOp, Expr, ExprKind, LogicOp};
pub use stmt::{ForKind, Stmt, StmtKind};
pub use types::{ScalarType, TypeParseError};
