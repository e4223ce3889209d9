//! Rendering calculation expressions as SQL.
//!
//! References resolve through a caller-supplied lookup (column aliases for
//! selected fields, inlined expressions for sibling calculations). `if(c, a,
//! b)` renders as CASE; every other function uses the dialect's spelling.

use crate::calc::{CalcBinaryOp, CalcExpr};
use crate::sql::{lit_float, lit_str, BinaryOperator, Dialect, Expr, SqlDialect};

/// Render a calculation to a SQL expression.
///
/// The caller guarantees (through validation and pushability checks) that
/// every reference resolves and every function has a dialect spelling.
pub fn render_calc(
    expr: &CalcExpr,
    dialect: Dialect,
    resolve: &dyn Fn(&crate::model::FieldId) -> Option<Expr>,
) -> Expr {
    match expr {
        CalcExpr::Ref(id) => resolve(id).unwrap_or_else(|| Expr::Column(id.column_alias())),
        CalcExpr::Number(n) => lit_float(*n),
        CalcExpr::String(s) => lit_str(s),
        CalcExpr::Neg(inner) => Expr::UnaryOp {
            op: crate::sql::UnaryOperator::Minus,
            expr: Box::new(parenthesize(render_calc(inner, dialect, resolve))),
        },
        CalcExpr::Binary { left, op, right } => Expr::BinaryOp {
            left: Box::new(parenthesize(render_calc(left, dialect, resolve))),
            op: binary_op(*op),
            right: Box::new(parenthesize(render_calc(right, dialect, resolve))),
        },
        CalcExpr::Func { name, args } if name == "if" => Expr::Case {
            when_clauses: vec![(
                render_calc(&args[0], dialect, resolve),
                render_calc(&args[1], dialect, resolve),
            )],
            else_clause: Some(Box::new(render_calc(&args[2], dialect, resolve))),
        },
        CalcExpr::Func { name, args } => {
            // Pushability was checked before rendering; the uppercase
            // fallback keeps an impossible miss from producing invalid SQL.
            let spelling = dialect
                .calc_function(name)
                .map(str::to_string)
                .unwrap_or_else(|| name.to_uppercase());
            Expr::Function {
                name: spelling,
                args: args
                    .iter()
                    .map(|arg| render_calc(arg, dialect, resolve))
                    .collect(),
                distinct: false,
            }
        }
    }
}

/// Wrap compound operands so author grouping survives re-rendering.
fn parenthesize(expr: Expr) -> Expr {
    match expr {
        compound @ (Expr::BinaryOp { .. } | Expr::Case { .. }) => {
            Expr::Paren(Box::new(compound))
        }
        simple => simple,
    }
}

fn binary_op(op: CalcBinaryOp) -> BinaryOperator {
    match op {
        CalcBinaryOp::Add => BinaryOperator::Plus,
        CalcBinaryOp::Sub => BinaryOperator::Minus,
        CalcBinaryOp::Mul => BinaryOperator::Mul,
        CalcBinaryOp::Div => BinaryOperator::Div,
        CalcBinaryOp::Mod => BinaryOperator::Mod,
        CalcBinaryOp::Eq => BinaryOperator::Eq,
        CalcBinaryOp::Ne => BinaryOperator::Ne,
        CalcBinaryOp::Lt => BinaryOperator::Lt,
        CalcBinaryOp::Lte => BinaryOperator::Lte,
        CalcBinaryOp::Gt => BinaryOperator::Gt,
        CalcBinaryOp::Gte => BinaryOperator::Gte,
    }
}
