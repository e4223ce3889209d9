//! Filter compilation: WHERE / HAVING split and leaf rendering.
//!
//! The AND/OR nesting of the request's filter tree is preserved exactly.
//! Leaves on aggregated fields (metrics, additional metrics) land in HAVING;
//! everything else lands in WHERE. AND groups may span both sides - they
//! split cleanly. OR groups are homogeneous by validation.
//!
//! Leaves always render the field's compiled SQL expression, never a bare
//! column name, so filters on computed dimensions behave exactly like filters
//! on plain columns.

use serde_json::Value;

use crate::catalog::FieldCatalog;
use crate::model::{FieldId, SemanticType};
use crate::query::{
    BoolOp, FilterComparison, FilterNode, FilterOperator, MetricQuery,
};
use crate::sql::{Dialect, Expr, ExprExt, Literal};
use crate::validate::{HandleKind, ValidatedQuery};

use super::{dimension_expr, metric_expr, CompileError, CompileResult};

/// Split a filter tree into WHERE and HAVING expressions.
pub fn split_filters(
    tree: &FilterNode,
    catalog: &FieldCatalog,
    request: &MetricQuery,
    validated: &ValidatedQuery,
    dialect: Dialect,
    timezone: Option<&str>,
) -> CompileResult<(Option<Expr>, Option<Expr>)> {
    let ctx = FilterContext {
        catalog,
        request,
        validated,
        dialect,
        timezone,
    };
    ctx.split(tree)
}

struct FilterContext<'a> {
    catalog: &'a FieldCatalog,
    request: &'a MetricQuery,
    validated: &'a ValidatedQuery,
    dialect: Dialect,
    timezone: Option<&'a str>,
}

impl FilterContext<'_> {
    fn split(&self, node: &FilterNode) -> CompileResult<(Option<Expr>, Option<Expr>)> {
        match node {
            FilterNode::Compare(cmp) => {
                let kind = self
                    .validated
                    .kind_of(&cmp.field)
                    .ok_or_else(|| CompileError::MissingDefinition {
                        id: cmp.field.clone(),
                    })?;
                let rendered = self.render_leaf(cmp, kind)?;
                if kind.is_aggregate() {
                    Ok((None, Some(rendered)))
                } else {
                    Ok((Some(rendered), None))
                }
            }
            FilterNode::Group(group) => {
                let mut where_parts = Vec::new();
                let mut having_parts = Vec::new();
                for child in &group.children {
                    let (w, h) = self.split(child)?;
                    if let Some(w) = w {
                        where_parts.push(w);
                    }
                    if let Some(h) = h {
                        having_parts.push(h);
                    }
                }
                Ok((
                    combine(where_parts, group.op),
                    combine(having_parts, group.op),
                ))
            }
        }
    }

    /// The comparison operand: the field's compiled expression.
    fn operand(&self, id: &FieldId, kind: HandleKind) -> CompileResult<Expr> {
        if kind.is_aggregate() {
            metric_expr(id, kind, self.catalog, self.request, self.dialect)
        } else {
            dimension_expr(
                id,
                kind,
                self.catalog,
                self.request,
                self.dialect,
                self.timezone,
            )
        }
    }

    fn semantic_type(&self, id: &FieldId, kind: HandleKind) -> SemanticType {
        match kind {
            HandleKind::Metric | HandleKind::AdditionalMetric => SemanticType::Number,
            HandleKind::CustomDimension => self
                .request
                .custom_dimensions
                .iter()
                .find(|c| &c.field_id() == id)
                .map(|c| c.semantic_type())
                .unwrap_or(SemanticType::String),
            _ => self
                .catalog
                .resolve(id)
                .map(|c| c.field.semantic_type())
                .unwrap_or(SemanticType::String),
        }
    }

    fn render_leaf(&self, cmp: &FilterComparison, kind: HandleKind) -> CompileResult<Expr> {
        let operand = self.operand(&cmp.field, kind)?;
        let semantic_type = self.semantic_type(&cmp.field, kind);
        let literal = |value: &Value| literal_expr(value, semantic_type);

        use FilterOperator::*;
        let expr = match cmp.op {
            Equals => {
                if cmp.values.len() == 1 {
                    operand.eq(literal(&cmp.values[0]))
                } else {
                    Expr::In {
                        expr: Box::new(operand),
                        values: cmp.values.iter().map(literal).collect(),
                        negated: false,
                    }
                }
            }
            NotEquals => {
                if cmp.values.len() == 1 {
                    operand.ne(literal(&cmp.values[0]))
                } else {
                    Expr::In {
                        expr: Box::new(operand),
                        values: cmp.values.iter().map(literal).collect(),
                        negated: true,
                    }
                }
            }
            LessThan => operand.lt(literal(&cmp.values[0])),
            LessThanOrEqual => operand.lte(literal(&cmp.values[0])),
            GreaterThan => operand.gt(literal(&cmp.values[0])),
            GreaterThanOrEqual => operand.gte(literal(&cmp.values[0])),
            StartsWith => like(operand, &format!("{}%", string_value(&cmp.values[0])), false),
            EndsWith => like(operand, &format!("%{}", string_value(&cmp.values[0])), false),
            Include => like(operand, &format!("%{}%", string_value(&cmp.values[0])), false),
            NotInclude => like(operand, &format!("%{}%", string_value(&cmp.values[0])), true),
            IsNull => operand.is_null(),
            NotNull => operand.is_not_null(),
            InBetween => Expr::Between {
                expr: Box::new(operand),
                low: Box::new(literal(&cmp.values[0])),
                high: Box::new(literal(&cmp.values[1])),
                negated: false,
            },
        };
        Ok(expr)
    }
}

fn like(operand: Expr, pattern: &str, negated: bool) -> Expr {
    Expr::Like {
        expr: Box::new(operand),
        pattern: Box::new(Expr::Literal(Literal::String(pattern.to_string()))),
        negated,
    }
}

fn string_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON filter value to a typed SQL literal, guided by the field's type.
fn literal_expr(value: &Value, semantic_type: SemanticType) -> Expr {
    let literal = match value {
        Value::Null => Literal::Null,
        Value::Bool(b) => Literal::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Literal::Int(i)
            } else {
                Literal::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => match semantic_type {
            SemanticType::Date => Literal::Date(s.clone()),
            SemanticType::Timestamp => Literal::Timestamp(s.clone()),
            _ => Literal::String(s.clone()),
        },
        other => Literal::String(other.to_string()),
    };
    Expr::Literal(literal)
}

/// Combine rendered parts with the group's connective, preserving nesting
/// with parentheses when more than one part survives on a side.
fn combine(parts: Vec<Expr>, op: BoolOp) -> Option<Expr> {
    let mut iter = parts.into_iter();
    let first = iter.next()?;
    let mut acc = first;
    let mut count = 1;
    for part in iter {
        acc = match op {
            BoolOp::And => acc.and(part),
            BoolOp::Or => acc.or(part),
        };
        count += 1;
    }
    if count > 1 {
        Some(Expr::Paren(Box::new(acc)))
    } else {
        Some(acc)
    }
}
