// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Handler table: IR node kind → lowering function.
//!
//! The generic engine fills the table; an accelerator configuration then
//! replaces the entries it lowers differently. A kind with no entry is an
//! unsupported construct.

use std::collections::HashMap;

use cranelift::prelude::Value;
use hwacha_ir::{Expr, ExprKind, Stmt, StmtKind};

use crate::emitter::{Binding, DeviceKernelEmitter, FunctionContext};
use crate::scope::SymbolScope;
use crate::CodegenResult;

pub(crate) type StmtHandler = for<'a, 'f> fn(
    &'a mut DeviceKernelEmitter,
    &'a mut FunctionContext<'f>,
    &'a mut SymbolScope<Binding>,
    &'a Stmt,
) -> CodegenResult<()>;

pub(crate) type ExprHandler = for<'a, 'f> fn(
    &'a mut DeviceKernelEmitter,
    &'a mut FunctionContext<'f>,
    &'a mut SymbolScope<Binding>,
    &'a Expr,
) -> CodegenResult<Value>;

pub(crate) struct HandlerTable {
    stmts: HashMap<StmtKind, StmtHandler>,
    exprs: HashMap<ExprKind, ExprHandler>,
}

impl HandlerTable {
    pub fn empty() -> Self {
        HandlerTable { stmts: HashMap::new(), exprs: HashMap::new() }
    }

    /// Table with every node kind the generic engine lowers.
    pub fn generic() -> Self {
        let mut table = Self::empty();
        crate::generic::install(&mut table);
        table
    }

    pub fn set_stmt(&mut self, kind: StmtKind, handler: StmtHandler) {
        self.stmts.insert(kind, handler);
    }

    pub fn set_expr(&mut self, kind: ExprKind, handler: ExprHandler) {
        self.exprs.insert(kind, handler);
    }

    pub fn stmt(&self, kind: StmtKind) -> Option<StmtHandler> {
        self.stmts.get(&kind).copied()
    }

    pub fn expr(&self, kind: ExprKind) -> Option<ExprHandler> {
        self.exprs.get(&kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_table_lowers_every_expression() {
        let table = HandlerTable::generic();
        for kind in ExprKind::ALL {
            assert!(table.expr(kind).is_some(), "no handler for {:?}", kind);
        }
        for kind in StmtKind::ALL {
            let expected = !matches!(kind, StmtKind::Allocate | StmtKind::Free | StmtKind::Assert);
            assert_eq!(table.stmt(kind).is_some(), expected, "{:?}", kind);
        }
    }

    #[test]
    fn device_table_covers_every_statement() {
        let mut table = HandlerTable::generic();
        let generic_for = table.stmt(StmtKind::For).map(|h| h as usize);
        crate::device::install(&mut table);
        for kind in StmtKind::ALL {
            assert!(table.stmt(kind).is_some(), "no handler for {:?}", kind);
        }
        assert_ne!(table.stmt(StmtKind::For).map(|h| h as usize), generic_for);
    }
}
