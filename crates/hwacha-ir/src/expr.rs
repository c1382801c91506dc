// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Expression nodes.

use crate::ScalarType;

/// Arithmetic operators. Both operands have the same type as the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
}

/// Comparisons, producing `bool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum LogicOp {
    And,
    Or,
}

/// How a `Call` is resolved by the code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "snake_case"))]
pub enum CallKind {
    /// Side-effect free math (`sqrt`, `abs`, `floor`, `ceil`, `trunc`, `fma`).
    PureIntrinsic,
    /// A symbol provided outside the module; imported by name.
    #[default]
    Extern,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "node", rename_all = "snake_case")
)]
pub enum Expr {
    IntImm {
        ty: ScalarType,
        value: i64,
    },
    UIntImm {
        ty: ScalarType,
        value: u64,
    },
    FloatImm {
        ty: ScalarType,
        value: f64,
    },
    Var {
        name: String,
        ty: ScalarType,
    },
    Cast {
        ty: ScalarType,
        value: Box<Expr>,
    },
    Binary {
        op: BinOp,
        a: Box<Expr>,
        b: Box<Expr>,
    },
    Cmp {
        op: CmpOp,
        a: Box<Expr>,
        b: Box<Expr>,
    },
    Logic {
        op: LogicOp,
        a: Box<Expr>,
        b: Box<Expr>,
    },
    Not {
        a: Box<Expr>,
    },
    Select {
        cond: Box<Expr>,
        then_value: Box<Expr>,
        else_value: Box<Expr>,
    },
    Let {
        name: String,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    /// Element `index` of the buffer argument `buffer`.
    Load {
        buffer: String,
        index: Box<Expr>,
        ty: ScalarType,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        ty: ScalarType,
        #[cfg_attr(feature = "serde", serde(default))]
        call_kind: CallKind,
    },
}

/// Discriminant of an [`Expr`], used to key handler tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Imm,
    Var,
    Cast,
    Binary,
    Cmp,
    Logic,
    Not,
    Select,
    Let,
    Load,
    Call,
}

impl ExprKind {
    pub const ALL: [ExprKind; 11] = [
        ExprKind::Imm,
        ExprKind::Var,
        ExprKind::Cast,
        ExprKind::Binary,
        ExprKind::Cmp,
        ExprKind::Logic,
        ExprKind::Not,
        ExprKind::Select,
        ExprKind::Let,
        ExprKind::Load,
        ExprKind::Call,
    ];
}

impl Expr {
    pub fn kind(&self) -> ExprKind {
        match self {
            Expr::IntImm { .. } | Expr::UIntImm { .. } | Expr::FloatImm { .. } => ExprKind::Imm,
            Expr::Var { .. } => ExprKind::Var,
            Expr::Cast { .. } => ExprKind::Cast,
            Expr::Binary { .. } => ExprKind::Binary,
            Expr::Cmp { .. } => ExprKind::Cmp,
            Expr::Logic { .. } => ExprKind::Logic,
            Expr::Not { .. } => ExprKind::Not,
            Expr::Select { .. } => ExprKind::Select,
            Expr::Let { .. } => ExprKind::Let,
            Expr::Load { .. } => ExprKind::Load,
            Expr::Call { .. } => ExprKind::Call,
        }
    }

    /// Result type of the expression.
    pub fn ty(&self) -> ScalarType {
        match self {
            Expr::IntImm { ty, .. }
            | Expr::UIntImm { ty, .. }
            | Expr::FloatImm { ty, .. }
            | Expr::Var { ty, .. }
            | Expr::Cast { ty, .. }
            | Expr::Load { ty, .. }
            | Expr::Call { ty, .. } => *ty,
            Expr::Binary { a, .. } => a.ty(),
            Expr::Cmp { .. } | Expr::Logic { .. } | Expr::Not { .. } => ScalarType::Bool,
            Expr::Select { then_value, .. } => then_value.ty(),
            Expr::Let { body, .. } => body.ty(),
        }
    }

    /// Integer value of a literal immediate, if this is one.
    pub fn as_const_int(&self) -> Option<i128> {
        match self {
            Expr::IntImm { value, .. } => Some(i128::from(*value)),
            Expr::UIntImm { value, .. } => Some(i128::from(*value)),
            _ => None,
        }
    }

    /// True only for a literal integer zero; `0 + 0` does not count.
    pub fn is_const_zero(&self) -> bool {
        self.as_const_int() == Some(0)
    }

    // ── Construction helpers ────────────────────────────────────

    pub fn int(value: i32) -> Expr {
        Expr::IntImm { ty: ScalarType::I32, value: i64::from(value) }
    }

    pub fn int_of(ty: ScalarType, value: i64) -> Expr {
        Expr::IntImm { ty, value }
    }

    pub fn f32(value: f32) -> Expr {
        Expr::FloatImm { ty: ScalarType::F32, value: f64::from(value) }
    }

    pub fn var(name: impl Into<String>, ty: ScalarType) -> Expr {
        Expr::Var { name: name.into(), ty }
    }

    pub fn cast(ty: ScalarType, value: Expr) -> Expr {
        Expr::Cast { ty, value: Box::new(value) }
    }

    pub fn binary(op: BinOp, a: Expr, b: Expr) -> Expr {
        Expr::Binary { op, a: Box::new(a), b: Box::new(b) }
    }

    pub fn add(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinOp::Add, a, b)
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        Expr::binary(BinOp::Mul, a, b)
    }

    pub fn cmp(op: CmpOp, a: Expr, b: Expr) -> Expr {
        Expr::Cmp { op, a: Box::new(a), b: Box::new(b) }
    }

    pub fn select(cond: Expr, then_value: Expr, else_value: Expr) -> Expr {
        Expr::Select {
            cond: Box::new(cond),
            then_value: Box::new(then_value),
            else_value: Box::new(else_value),
        }
    }

    pub fn load(buffer: impl Into<String>, index: Expr, ty: ScalarType) -> Expr {
        Expr::Load { buffer: buffer.into(), index: Box::new(index), ty }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>, ty: ScalarType, call_kind: CallKind) -> Expr {
        Expr::Call { name: name.into(), args, ty, call_kind }
    }
}
