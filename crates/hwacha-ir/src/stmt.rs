// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Statement nodes.

use crate::{Expr, ScalarType};

/// Scheduling tag of a loop. Lane loops are recognized by the loop
/// variable's suffix, not by this tag; it is carried for printing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum ForKind {
    #[default]
    Serial,
    Parallel,
    GpuBlock,
    GpuThread,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "node", rename_all = "snake_case")
)]
pub enum Stmt {
    LetStmt {
        name: String,
        value: Expr,
        body: Box<Stmt>,
    },
    Block {
        stmts: Vec<Stmt>,
    },
    IfThenElse {
        cond: Expr,
        then_case: Box<Stmt>,
        #[cfg_attr(feature = "serde", serde(default))]
        else_case: Option<Box<Stmt>>,
    },
    For {
        name: String,
        min: Expr,
        extent: Expr,
        #[cfg_attr(feature = "serde", serde(default))]
        kind: ForKind,
        body: Box<Stmt>,
    },
    /// `buffer[index] = value`
    Store {
        buffer: String,
        value: Expr,
        index: Expr,
    },
    Evaluate {
        value: Expr,
    },
    Allocate {
        name: String,
        ty: ScalarType,
        extents: Vec<Expr>,
        body: Box<Stmt>,
    },
    Free {
        name: String,
    },
    Assert {
        condition: Expr,
        message: String,
    },
}

/// Discriminant of a [`Stmt`], used to key handler tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StmtKind {
    LetStmt,
    Block,
    IfThenElse,
    For,
    Store,
    Evaluate,
    Allocate,
    Free,
    Assert,
}

impl StmtKind {
    pub const ALL: [StmtKind; 9] = [
        StmtKind::LetStmt,
        StmtKind::Block,
        StmtKind::IfThenElse,
        StmtKind::For,
        StmtKind::Store,
        StmtKind::Evaluate,
        StmtKind::Allocate,
        StmtKind::Free,
        StmtKind::Assert,
    ];
}

impl Stmt {
    pub fn kind(&self) -> StmtKind {
        match self {
            Stmt::LetStmt { .. } => StmtKind::LetStmt,
            Stmt::Block { .. } => StmtKind::Block,
            Stmt::IfThenElse { .. } => StmtKind::IfThenElse,
            Stmt::For { .. } => StmtKind::For,
            Stmt::Store { .. } => StmtKind::Store,
            Stmt::Evaluate { .. } => StmtKind::Evaluate,
            Stmt::Allocate { .. } => StmtKind::Allocate,
            Stmt::Free { .. } => StmtKind::Free,
            Stmt::Assert { .. } => StmtKind::Assert,
        }
    }

    pub fn block(stmts: Vec<Stmt>) -> Stmt {
        Stmt::Block { stmts }
    }

    pub fn for_loop(name: impl Into<String>, min: Expr, extent: Expr, kind: ForKind, body: Stmt) -> Stmt {
        Stmt::For { name: name.into(), min, extent, kind, body: Box::new(body) }
    }

    pub fn store(buffer: impl Into<String>, value: Expr, index: Expr) -> Stmt {
        Stmt::Store { buffer: buffer.into(), value, index }
    }

    pub fn let_stmt(name: impl Into<String>, value: Expr, body: Stmt) -> Stmt {
        Stmt::LetStmt { name: name.into(), value, body: Box::new(body) }
    }

    pub fn if_then(cond: Expr, then_case: Stmt) -> Stmt {
        Stmt::IfThenElse { cond, then_case: Box::new(then_case), else_case: None }
    }
}
