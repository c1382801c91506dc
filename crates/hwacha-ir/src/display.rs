// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Display implementations for IR nodes.

use crate::*;
use std::fmt;

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Min => "min",
            BinOp::Max => "max",
        };
        write!(f, "{}", sym)
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sym = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{}", sym)
    }
}

impl fmt::Display for LogicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicOp::And => write!(f, "&&"),
            LogicOp::Or => write!(f, "||"),
        }
    }
}

impl fmt::Display for ForKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForKind::Serial => write!(f, "for"),
            ForKind::Parallel => write!(f, "parallel"),
            ForKind::GpuBlock => write!(f, "gpu_block"),
            ForKind::GpuThread => write!(f, "gpu_thread"),
        }
    }
}

impl fmt::Display for DeviceArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_buffer {
            write!(f, "{}: *{}", self.name, self.ty)
        } else {
            write!(f, "{}: {}", self.name, self.ty)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::IntImm { value, ty } if *ty == ScalarType::I32 => write!(f, "{}", value),
            Expr::IntImm { value, ty } => write!(f, "({}){}", ty, value),
            Expr::UIntImm { value, ty } => write!(f, "({}){}", ty, value),
            Expr::FloatImm { value, ty } => write!(f, "{:?}{}", value, ty),
            Expr::Var { name, .. } => write!(f, "{}", name),
            Expr::Cast { ty, value } => write!(f, "{}({})", ty, value),
            Expr::Binary { op: op @ (BinOp::Min | BinOp::Max), a, b } => {
                write!(f, "{}({}, {})", op, a, b)
            }
            Expr::Binary { op, a, b } => write!(f, "({} {} {})", a, op, b),
            Expr::Cmp { op, a, b } => write!(f, "({} {} {})", a, op, b),
            Expr::Logic { op, a, b } => write!(f, "({} {} {})", a, op, b),
            Expr::Not { a } => write!(f, "!{}", a),
            Expr::Select { cond, then_value, else_value } => {
                write!(f, "select({}, {}, {})", cond, then_value, else_value)
            }
            Expr::Let { name, value, body } => write!(f, "(let {} = {} in {})", name, value, body),
            Expr::Load { buffer, index, .. } => write!(f, "{}[{}]", buffer, index),
            Expr::Call { name, args, .. } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_stmt(self, f, 0)
    }
}

fn fmt_stmt(stmt: &Stmt, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    let pad = "  ".repeat(indent);
    match stmt {
        Stmt::LetStmt { name, value, body } => {
            writeln!(f, "{}let {} = {}", pad, name, value)?;
            fmt_stmt(body, f, indent)
        }
        Stmt::Block { stmts } => {
            for s in stmts {
                fmt_stmt(s, f, indent)?;
            }
            Ok(())
        }
        Stmt::IfThenElse { cond, then_case, else_case } => {
            writeln!(f, "{}if ({}) {{", pad, cond)?;
            fmt_stmt(then_case, f, indent + 1)?;
            if let Some(else_case) = else_case {
                writeln!(f, "{}}} else {{", pad)?;
                fmt_stmt(else_case, f, indent + 1)?;
            }
            writeln!(f, "{}}}", pad)
        }
        Stmt::For { name, min, extent, kind, body } => {
            writeln!(f, "{}{} ({}, {}, {}) {{", pad, kind, name, min, extent)?;
            fmt_stmt(body, f, indent + 1)?;
            writeln!(f, "{}}}", pad)
        }
        Stmt::Store { buffer, value, index } => {
            writeln!(f, "{}{}[{}] = {}", pad, buffer, index, value)
        }
        Stmt::Evaluate { value } => writeln!(f, "{}{}", pad, value),
        Stmt::Allocate { name, ty, extents, body } => {
            write!(f, "{}allocate {}[{}", pad, name, ty)?;
            for e in extents {
                write!(f, " * {}", e)?;
            }
            writeln!(f, "]")?;
            fmt_stmt(body, f, indent)
        }
        Stmt::Free { name } => writeln!(f, "{}free {}", pad, name),
        Stmt::Assert { condition, message } => {
            writeln!(f, "{}assert({}, {:?})", pad, condition, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn prints_nested_loops() {
        let i = Expr::var("i", ScalarType::I32);
        let body = Stmt::store(
            "y",
            Expr::add(Expr::load("x", i.clone(), ScalarType::F32), Expr::f32(1.0)),
            i,
        );
        let stmt = Stmt::for_loop(
            "f.s0.x.__block_id_x",
            Expr::int(0),
            Expr::var("n", ScalarType::I32),
            ForKind::GpuBlock,
            body,
        );
        assert_eq!(
            stmt.to_string(),
            "gpu_block (f.s0.x.__block_id_x, 0, n) {\n  y[i] = (x[i] + 1.0f32)\n}\n"
        );
    }
}
