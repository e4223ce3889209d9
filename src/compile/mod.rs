//! SQL compilation.
//!
//! Renders a resolved query into one SELECT statement for a target dialect.
//! Compilation is pure and deterministic: identical input always produces
//! byte-identical SQL.
//!
//! Column order is fixed by contract: the dimension block (request order,
//! custom dimensions at their declared positions), the metric block (request
//! order, unreferenced additional metrics appended), then table calculations.
//! When table calculations are present the aggregation query is wrapped in a
//! `metrics` CTE and the calculations select over its output aliases.

mod calc_sql;
mod filters;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::calc;
use crate::catalog::FieldCatalog;
use crate::model::{Aggregation, FieldId, FormatOptions, SemanticType};
use crate::query::{BucketRange, CustomDimensionKind, MetricQuery};
use crate::resolve::ResolvedQuery;
use crate::sql::{
    lit_float, lit_str, raw, Cte, Dialect, Expr, ExprExt, FromClause, JoinClause, OrderByExpr,
    Query, SelectExpr, SqlDialect, SqlJoinKind, TableRef,
};
use crate::validate::HandleKind;

pub use calc_sql::render_calc;

pub type CompileResult<T> = Result<T, CompileError>;

/// A construct the target dialect cannot express. Reported, never retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error("dialect '{dialect}' cannot express {aggregation:?} for metric '{field}'")]
    UnsupportedAggregate {
        dialect: &'static str,
        aggregation: Aggregation,
        field: FieldId,
    },

    #[error(
        "cannot sort on table calculation '{name}': dialect '{dialect}' cannot compute it in SQL"
    )]
    SortOnUnpushedCalculation { name: String, dialect: &'static str },

    /// A definition lookup that validation guarantees failed anyway; a bug in
    /// the pipeline, not in the request.
    #[error("missing definition for '{id}' after validation")]
    MissingDefinition { id: FieldId },
}

/// One output column of a compiled query.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    pub id: FieldId,
    /// SQL column alias the warehouse keys this field's values by.
    pub alias: String,
    pub kind: HandleKind,
    pub semantic_type: SemanticType,
    pub format: FormatOptions,
    pub label: String,
    /// Owning table for catalog fields and additional metrics.
    pub table: Option<String>,
}

/// A table calculation the dialect could not express; evaluated row-locally
/// by the result mapper.
#[derive(Debug, Clone, PartialEq)]
pub struct PostCalculation {
    pub id: FieldId,
    pub expr: calc::CalcExpr,
}

/// An immutable compiled query: SQL text plus the ordered output field list
/// that defines column order and provenance.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub sql: String,
    pub dialect: Dialect,
    pub fields: Vec<OutputField>,
    pub post_calcs: Vec<PostCalculation>,
    /// Stable fingerprint over (dialect, explore, SQL); external caches key
    /// results by it.
    pub fingerprint: String,
    /// The request this query was compiled from, echoed in responses.
    pub metric_query: MetricQuery,
    pub explore_name: String,
}

impl CompiledQuery {
    pub fn field(&self, id: &FieldId) -> Option<&OutputField> {
        self.fields.iter().find(|f| &f.id == id)
    }

    pub fn field_by_alias(&self, alias: &str) -> Option<&OutputField> {
        self.fields.iter().find(|f| f.alias == alias)
    }
}

/// Compile a resolved query for a dialect.
pub fn compile(
    resolved: &ResolvedQuery,
    catalog: &FieldCatalog,
    dialect: Dialect,
) -> CompileResult<CompiledQuery> {
    let validated = resolved.validated();
    let request = validated.request();
    let timezone = validated.timezone();

    // Select list + output descriptors for the dimension and metric blocks.
    let mut select = Vec::new();
    let mut fields = Vec::new();
    let mut group_by = Vec::new();

    for handle in validated.dimensions() {
        let expr = dimension_expr(handle.id(), handle.kind(), catalog, request, dialect, timezone)?;
        group_by.push(expr.clone());
        let descriptor = describe_field(handle.id(), handle.kind(), catalog, request)?;
        select.push(SelectExpr::new(expr, &descriptor.alias));
        fields.push(descriptor);
    }

    for handle in validated.metrics() {
        let expr = metric_expr(handle.id(), handle.kind(), catalog, request, dialect)?;
        let descriptor = describe_field(handle.id(), handle.kind(), catalog, request)?;
        select.push(SelectExpr::new(expr, &descriptor.alias));
        fields.push(descriptor);
    }

    let has_metrics = !validated.metrics().is_empty();
    let group_by = if has_metrics && !group_by.is_empty() {
        group_by
    } else {
        vec![]
    };

    // WHERE / HAVING split by field kind.
    let (where_clause, having) = match validated.filters() {
        Some(tree) => filters::split_filters(tree, catalog, request, validated, dialect, timezone)?,
        None => (None, None),
    };

    // Table calculations: pushable ones become SQL over the CTE aliases;
    // the rest are recorded for the mapper.
    let mut pushed: Vec<(String, Expr)> = Vec::new();
    let mut post_calcs: Vec<PostCalculation> = Vec::new();
    for validated_calc in validated.calcs() {
        let functions_expressible = validated_calc
            .expr
            .functions()
            .iter()
            .all(|name| *name == "if" || dialect.calc_function(name).is_some());
        // A calculation referencing one the mapper computes cannot run in SQL
        // either: its operand has no column alias.
        let references_post_calc = validated_calc
            .expr
            .references()
            .iter()
            .any(|reference| post_calcs.iter().any(|p| &p.id == *reference));
        let id = FieldId::named(&validated_calc.name);
        if functions_expressible && !references_post_calc {
            // References to earlier calculations inline their rendered
            // expression: sibling aliases in the same SELECT list are not
            // addressable.
            let rendered = render_calc(&validated_calc.expr, dialect, &|reference| {
                if let Some((_, expr)) = pushed
                    .iter()
                    .find(|(name, _)| FieldId::named(name) == *reference)
                {
                    return Some(Expr::Paren(Box::new(expr.clone())));
                }
                fields
                    .iter()
                    .find(|f| &f.id == reference && f.kind != HandleKind::TableCalculation)
                    .map(|f| Expr::Column(f.alias.clone()))
            });
            pushed.push((validated_calc.name.clone(), rendered));
        } else {
            post_calcs.push(PostCalculation {
                id: id.clone(),
                expr: validated_calc.expr.clone(),
            });
        }
        fields.push(OutputField {
            alias: id.column_alias(),
            id,
            kind: HandleKind::TableCalculation,
            semantic_type: SemanticType::Number,
            format: validated_calc.format.clone(),
            label: validated_calc
                .label
                .clone()
                .unwrap_or_else(|| validated_calc.name.clone()),
            table: None,
        });
    }

    // Sorts always target output aliases. Sorting on a calculation the
    // dialect cannot compute would require materializing before sorting; that
    // is rejected instead of silently absorbed.
    let mut order_by = Vec::new();
    for sort in &request.sorts {
        if post_calcs.iter().any(|p| p.id == sort.field) {
            return Err(CompileError::SortOnUnpushedCalculation {
                name: sort.field.as_str().to_string(),
                dialect: dialect.name(),
            });
        }
        order_by.push(OrderByExpr {
            alias: sort.field.column_alias(),
            descending: sort.descending,
        });
    }

    let inner = Query {
        select,
        from: Some(from_clause(catalog)),
        joins: join_clauses(resolved, catalog),
        where_clause,
        group_by,
        having,
        ..Query::default()
    };

    let query = if validated.calcs().is_empty() {
        Query {
            order_by,
            limit: request.limit,
            ..inner
        }
    } else {
        // Calculations select over the aggregation's aliases via a CTE.
        let mut outer_select: Vec<SelectExpr> = fields
            .iter()
            .filter(|f| f.kind != HandleKind::TableCalculation)
            .map(|f| SelectExpr::new(Expr::Column(f.alias.clone()), &f.alias))
            .collect();
        for (name, expr) in &pushed {
            outer_select.push(SelectExpr::new(
                expr.clone(),
                &FieldId::named(name).column_alias(),
            ));
        }
        Query {
            with: Some(Cte {
                name: "metrics".into(),
                query: Box::new(inner),
            }),
            select: outer_select,
            from: Some(FromClause::Cte("metrics".into())),
            order_by,
            limit: request.limit,
            ..Query::default()
        }
    };

    let sql = query.to_sql(dialect);
    let fingerprint = fingerprint(dialect, catalog.explore_name(), &sql);

    tracing::debug!(
        explore = catalog.explore_name(),
        dialect = dialect.name(),
        columns = fields.len(),
        post_calcs = post_calcs.len(),
        sql_bytes = sql.len(),
        "query compiled"
    );

    Ok(CompiledQuery {
        sql,
        dialect,
        fields,
        post_calcs,
        fingerprint,
        metric_query: request.clone(),
        explore_name: catalog.explore_name().to_string(),
    })
}

/// Stable fingerprint for result caching, keyed on everything that changes
/// the result set.
fn fingerprint(dialect: Dialect, explore: &str, sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(dialect.name().as_bytes());
    hasher.update(b"\n");
    hasher.update(explore.as_bytes());
    hasher.update(b"\n");
    hasher.update(sql.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn from_clause(catalog: &FieldCatalog) -> FromClause {
    let base = catalog
        .table(catalog.base_table())
        .expect("catalog build guarantees the base table");
    FromClause::Table(TableRef {
        schema: base.sql_schema.clone(),
        table: base.sql_table.clone(),
        alias: base.name.clone(),
    })
}

fn join_clauses(resolved: &ResolvedQuery, catalog: &FieldCatalog) -> Vec<JoinClause> {
    resolved
        .joins()
        .iter()
        .map(|join| {
            let table = catalog
                .table(&join.table)
                .expect("resolver only emits known tables");
            JoinClause {
                kind: match join.kind {
                    crate::model::JoinKind::Left => SqlJoinKind::Left,
                    crate::model::JoinKind::Inner => SqlJoinKind::Inner,
                },
                table: TableRef {
                    schema: table.sql_schema.clone(),
                    table: table.sql_table.clone(),
                    alias: table.name.clone(),
                },
                on: raw(&join.sql_on),
            }
        })
        .collect()
}

/// The SELECT expression for a dimension-block field.
pub(crate) fn dimension_expr(
    id: &FieldId,
    kind: HandleKind,
    catalog: &FieldCatalog,
    request: &MetricQuery,
    dialect: Dialect,
    timezone: Option<&str>,
) -> CompileResult<Expr> {
    match kind {
        HandleKind::Dimension => {
            let compiled = catalog
                .resolve(id)
                .ok_or_else(|| CompileError::MissingDefinition { id: id.clone() })?;
            let mut sql = compiled.compiled_sql.clone();
            if compiled.field.semantic_type() == SemanticType::Timestamp {
                if let Some(tz) = timezone {
                    sql = dialect.emit_timezone_convert(&sql, tz);
                }
            }
            Ok(raw(&sql))
        }
        HandleKind::CustomDimension => {
            let custom = request
                .custom_dimensions
                .iter()
                .find(|c| &c.field_id() == id)
                .ok_or_else(|| CompileError::MissingDefinition { id: id.clone() })?;
            match &custom.kind {
                CustomDimensionKind::Bucket {
                    base_dimension,
                    ranges,
                } => {
                    let base = catalog
                        .resolve(base_dimension)
                        .ok_or_else(|| CompileError::MissingDefinition {
                            id: base_dimension.clone(),
                        })?;
                    Ok(bucket_case(&base.compiled_sql, ranges))
                }
                CustomDimensionKind::Sql { sql, .. } => {
                    let substituted = calc::replace_references(sql, |reference| {
                        catalog.resolve(reference).map(|c| c.compiled_sql.clone())
                    });
                    Ok(raw(&substituted))
                }
            }
        }
        _ => Err(CompileError::MissingDefinition { id: id.clone() }),
    }
}

/// The SELECT expression for a metric-block field.
pub(crate) fn metric_expr(
    id: &FieldId,
    kind: HandleKind,
    catalog: &FieldCatalog,
    request: &MetricQuery,
    dialect: Dialect,
) -> CompileResult<Expr> {
    let (aggregation, operand, percentile) = match kind {
        HandleKind::Metric => {
            let compiled = catalog
                .resolve(id)
                .ok_or_else(|| CompileError::MissingDefinition { id: id.clone() })?;
            match &compiled.field {
                crate::model::Field::Metric(metric) => (
                    metric.aggregation,
                    compiled.compiled_sql.clone(),
                    metric.percentile,
                ),
                _ => return Err(CompileError::MissingDefinition { id: id.clone() }),
            }
        }
        HandleKind::AdditionalMetric => {
            let metric = request
                .additional_metrics
                .iter()
                .find(|m| &m.id() == id)
                .ok_or_else(|| CompileError::MissingDefinition { id: id.clone() })?;
            (
                metric.aggregation,
                metric.sql.replace("${TABLE}", &metric.table),
                metric.percentile,
            )
        }
        _ => return Err(CompileError::MissingDefinition { id: id.clone() }),
    };

    dialect
        .emit_aggregate(aggregation, &operand, percentile)
        .map(|sql| raw(&sql))
        .ok_or_else(|| CompileError::UnsupportedAggregate {
            dialect: dialect.name(),
            aggregation,
            field: id.clone(),
        })
}

/// CASE expression mapping a numeric base onto labeled ranges.
fn bucket_case(base_sql: &str, ranges: &[BucketRange]) -> Expr {
    let when_clauses = ranges
        .iter()
        .map(|range| {
            let condition = match (range.from, range.to) {
                (Some(from), Some(to)) => raw(base_sql)
                    .gte(lit_float(from))
                    .and(raw(base_sql).lt(lit_float(to))),
                (Some(from), None) => raw(base_sql).gte(lit_float(from)),
                (None, Some(to)) => raw(base_sql).lt(lit_float(to)),
                (None, None) => raw(base_sql).is_not_null(),
            };
            (condition, lit_str(&range.display_label()))
        })
        .collect();
    Expr::Case {
        when_clauses,
        else_clause: None,
    }
}

/// Output descriptor for a selected field.
fn describe_field(
    id: &FieldId,
    kind: HandleKind,
    catalog: &FieldCatalog,
    request: &MetricQuery,
) -> CompileResult<OutputField> {
    match kind {
        HandleKind::Dimension | HandleKind::Metric => {
            let compiled = catalog
                .resolve(id)
                .ok_or_else(|| CompileError::MissingDefinition { id: id.clone() })?;
            Ok(OutputField {
                id: id.clone(),
                alias: id.column_alias(),
                kind,
                semantic_type: compiled.field.semantic_type(),
                format: compiled.field.format().clone(),
                label: compiled.field.label(),
                table: Some(compiled.field.table().to_string()),
            })
        }
        HandleKind::AdditionalMetric => {
            let metric = request
                .additional_metrics
                .iter()
                .find(|m| &m.id() == id)
                .ok_or_else(|| CompileError::MissingDefinition { id: id.clone() })?;
            Ok(OutputField {
                id: id.clone(),
                alias: id.column_alias(),
                kind,
                semantic_type: SemanticType::Number,
                format: metric.format.clone(),
                label: metric
                    .label
                    .clone()
                    .unwrap_or_else(|| metric.name.clone()),
                table: Some(metric.table.clone()),
            })
        }
        HandleKind::CustomDimension => {
            let custom = request
                .custom_dimensions
                .iter()
                .find(|c| &c.field_id() == id)
                .ok_or_else(|| CompileError::MissingDefinition { id: id.clone() })?;
            Ok(OutputField {
                id: id.clone(),
                alias: id.column_alias(),
                kind,
                semantic_type: custom.semantic_type(),
                format: FormatOptions::default(),
                label: custom.label.clone().unwrap_or_else(|| custom.id.clone()),
                table: None,
            })
        }
        HandleKind::TableCalculation => Err(CompileError::MissingDefinition { id: id.clone() }),
    }
}
