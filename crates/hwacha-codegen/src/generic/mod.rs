// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Generic lowering engine: ordinary control flow, arithmetic, and memory.
//!
//! Nothing here knows about lanes. Loops iterate, loads and stores address
//! buffer arguments directly, calls go to intrinsics or imported symbols.

pub(crate) mod expr;
pub(crate) mod stmt;

use hwacha_ir::{ExprKind, StmtKind};

use crate::dispatch::HandlerTable;

pub(crate) fn install(table: &mut HandlerTable) {
    table.set_stmt(StmtKind::LetStmt, stmt::lower_let_stmt);
    table.set_stmt(StmtKind::Block, stmt::lower_block);
    table.set_stmt(StmtKind::IfThenElse, stmt::lower_if);
    table.set_stmt(StmtKind::For, stmt::lower_for);
    table.set_stmt(StmtKind::Store, stmt::lower_store);
    table.set_stmt(StmtKind::Evaluate, stmt::lower_evaluate);

    table.set_expr(ExprKind::Imm, expr::lower_imm);
    table.set_expr(ExprKind::Var, expr::lower_var);
    table.set_expr(ExprKind::Cast, expr::lower_cast);
    table.set_expr(ExprKind::Binary, expr::lower_binary);
    table.set_expr(ExprKind::Cmp, expr::lower_cmp);
    table.set_expr(ExprKind::Logic, expr::lower_logic);
    table.set_expr(ExprKind::Not, expr::lower_not);
    table.set_expr(ExprKind::Select, expr::lower_select);
    table.set_expr(ExprKind::Let, expr::lower_let);
    table.set_expr(ExprKind::Load, expr::lower_load);
    table.set_expr(ExprKind::Call, expr::lower_call);
}
