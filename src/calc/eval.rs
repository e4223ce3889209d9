//! Row-local evaluation of calculation expressions.
//!
//! Used by the result mapper for calculations the target dialect could not
//! express as SQL. Evaluation is side-effect-free and sees only the current
//! row's already-mapped raw values.

use inflector::Inflector;

use crate::model::FieldId;
use crate::results::RawValue;

use super::{CalcBinaryOp, CalcExpr};

/// Evaluate an expression against one row.
///
/// `lookup` resolves a reference to the row's raw value; unknown references
/// and type mismatches evaluate to null rather than failing the row.
pub fn evaluate(expr: &CalcExpr, lookup: &dyn Fn(&FieldId) -> Option<RawValue>) -> RawValue {
    match expr {
        CalcExpr::Ref(id) => lookup(id).unwrap_or(RawValue::Null),
        CalcExpr::Number(n) => float_value(*n),
        CalcExpr::String(s) => RawValue::String(s.clone()),
        CalcExpr::Neg(inner) => match evaluate(inner, lookup) {
            RawValue::Int(i) => RawValue::Int(-i),
            RawValue::Float(f) => RawValue::Float(-f),
            _ => RawValue::Null,
        },
        CalcExpr::Binary { left, op, right } => {
            let lhs = evaluate(left, lookup);
            let rhs = evaluate(right, lookup);
            binary(&lhs, *op, &rhs)
        }
        CalcExpr::Func { name, args } => function(name, args, lookup),
    }
}

fn float_value(n: f64) -> RawValue {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        RawValue::Int(n as i64)
    } else {
        RawValue::Float(n)
    }
}

fn binary(lhs: &RawValue, op: CalcBinaryOp, rhs: &RawValue) -> RawValue {
    use CalcBinaryOp::*;

    match op {
        Add | Sub | Mul | Div | Mod => {
            let (a, b) = match (lhs.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => (a, b),
                _ => return RawValue::Null,
            };
            let result = match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => {
                    if b == 0.0 {
                        return RawValue::Null;
                    }
                    a / b
                }
                Mod => {
                    if b == 0.0 {
                        return RawValue::Null;
                    }
                    a % b
                }
                _ => unreachable!(),
            };
            float_value(result)
        }
        Eq | Ne | Lt | Lte | Gt | Gte => compare(lhs, op, rhs),
    }
}

fn compare(lhs: &RawValue, op: CalcBinaryOp, rhs: &RawValue) -> RawValue {
    use std::cmp::Ordering;

    // SQL semantics: comparing against null is null.
    if lhs.is_null() || rhs.is_null() {
        return RawValue::Null;
    }

    let ordering = match (lhs, rhs) {
        (RawValue::String(a), RawValue::String(b)) => a.cmp(b),
        (RawValue::Bool(a), RawValue::Bool(b)) => a.cmp(b),
        (RawValue::Date(a), RawValue::Date(b)) => a.cmp(b),
        (RawValue::Timestamp(a), RawValue::Timestamp(b)) => a.cmp(b),
        _ => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => match a.partial_cmp(&b) {
                Some(ord) => ord,
                None => return RawValue::Null,
            },
            _ => return RawValue::Null,
        },
    };

    let result = match op {
        CalcBinaryOp::Eq => ordering == Ordering::Equal,
        CalcBinaryOp::Ne => ordering != Ordering::Equal,
        CalcBinaryOp::Lt => ordering == Ordering::Less,
        CalcBinaryOp::Lte => ordering != Ordering::Greater,
        CalcBinaryOp::Gt => ordering == Ordering::Greater,
        CalcBinaryOp::Gte => ordering != Ordering::Less,
        _ => unreachable!(),
    };
    RawValue::Bool(result)
}

fn function(name: &str, args: &[CalcExpr], lookup: &dyn Fn(&FieldId) -> Option<RawValue>) -> RawValue {
    let eval = |e: &CalcExpr| evaluate(e, lookup);

    match name {
        "if" => {
            let cond = eval(&args[0]);
            match cond {
                RawValue::Bool(true) => eval(&args[1]),
                RawValue::Bool(false) => eval(&args[2]),
                // Null / non-boolean condition takes the else branch.
                _ => eval(&args[2]),
            }
        }
        "coalesce" => args
            .iter()
            .map(eval)
            .find(|v| !v.is_null())
            .unwrap_or(RawValue::Null),
        "nullif" => {
            let a = eval(&args[0]);
            let b = eval(&args[1]);
            if compare(&a, CalcBinaryOp::Eq, &b) == RawValue::Bool(true) {
                RawValue::Null
            } else {
                a
            }
        }
        "greatest" | "least" => {
            let values: Vec<RawValue> = args.iter().map(eval).collect();
            if values.iter().any(RawValue::is_null) {
                return RawValue::Null;
            }
            let want_greater = name == "greatest";
            values
                .into_iter()
                .reduce(|best, candidate| {
                    let keep_candidate =
                        compare(&candidate, CalcBinaryOp::Gt, &best) == RawValue::Bool(true);
                    if keep_candidate == want_greater {
                        candidate
                    } else {
                        best
                    }
                })
                .unwrap_or(RawValue::Null)
        }
        "concat" => {
            let mut out = String::new();
            for arg in args {
                match eval(arg) {
                    RawValue::Null => {}
                    RawValue::String(s) => out.push_str(&s),
                    other => out.push_str(&stringify(&other)),
                }
            }
            RawValue::String(out)
        }
        "upper" => string_fn(&eval(&args[0]), |s| s.to_uppercase()),
        "lower" => string_fn(&eval(&args[0]), |s| s.to_lowercase()),
        "initcap" => string_fn(&eval(&args[0]), |s| s.to_title_case()),
        "abs" => numeric_fn(&eval(&args[0]), f64::abs),
        "floor" => numeric_fn(&eval(&args[0]), f64::floor),
        "ceil" => numeric_fn(&eval(&args[0]), f64::ceil),
        "sqrt" => numeric_fn(&eval(&args[0]), f64::sqrt),
        "ln" => numeric_fn(&eval(&args[0]), f64::ln),
        "exp" => numeric_fn(&eval(&args[0]), f64::exp),
        "power" => {
            match (eval(&args[0]).as_f64(), eval(&args[1]).as_f64()) {
                (Some(base), Some(exp)) => float_value(base.powf(exp)),
                _ => RawValue::Null,
            }
        }
        "round" => {
            let value = eval(&args[0]);
            let digits = args
                .get(1)
                .map(|a| eval(a).as_f64().unwrap_or(0.0) as i32)
                .unwrap_or(0);
            match value.as_f64() {
                Some(v) => {
                    let factor = 10f64.powi(digits);
                    float_value((v * factor).round() / factor)
                }
                None => RawValue::Null,
            }
        }
        // Parser guarantees the function set; anything else is a bug upstream.
        _ => RawValue::Null,
    }
}

fn stringify(value: &RawValue) -> String {
    match value {
        RawValue::Null => String::new(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Int(i) => i.to_string(),
        RawValue::Float(f) => f.to_string(),
        RawValue::String(s) => s.clone(),
        RawValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        RawValue::Timestamp(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

fn string_fn(value: &RawValue, f: impl Fn(&str) -> String) -> RawValue {
    match value {
        RawValue::String(s) => RawValue::String(f(s)),
        RawValue::Null => RawValue::Null,
        other => RawValue::String(f(&stringify(other))),
    }
}

fn numeric_fn(value: &RawValue, f: impl Fn(f64) -> f64) -> RawValue {
    match value.as_f64() {
        Some(v) => float_value(f(v)),
        None => RawValue::Null,
    }
}
