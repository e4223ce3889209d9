//! Join resolution.
//!
//! Determines the minimal set of tables a validated query touches and
//! produces a deterministic join order: every join appears after the tables
//! its condition depends on, and ties break on the order fields were first
//! referenced in the request's dimension and metric lists.

use crate::calc;
use crate::catalog::{CompiledJoin, FieldCatalog};
use crate::model::FieldId;
use crate::query::CustomDimensionKind;
use crate::validate::{HandleKind, ValidatedQuery, ValidationError};

/// A validated query with its join plan.
#[derive(Debug, Clone)]
pub struct ResolvedQuery {
    validated: ValidatedQuery,
    joins: Vec<CompiledJoin>,
}

impl ResolvedQuery {
    pub fn validated(&self) -> &ValidatedQuery {
        &self.validated
    }

    /// Joins in emission order.
    pub fn joins(&self) -> &[CompiledJoin] {
        &self.joins
    }

    pub fn into_parts(self) -> (ValidatedQuery, Vec<CompiledJoin>) {
        (self.validated, self.joins)
    }
}

/// Resolve the join plan for a validated query.
pub fn resolve_joins(
    validated: ValidatedQuery,
    catalog: &FieldCatalog,
) -> Result<ResolvedQuery, ValidationError> {
    let referenced = referenced_tables(&validated, catalog);

    let mut joins: Vec<CompiledJoin> = Vec::new();
    for table in &referenced {
        if table == catalog.base_table() {
            continue;
        }
        let path = catalog
            .join_path(table)
            .ok_or_else(|| ValidationError::UnreachableTable {
                table: table.clone(),
                context: "join resolution".to_string(),
            })?;
        for join in path {
            if !joins.iter().any(|existing| existing.table == join.table) {
                joins.push(join.clone());
            }
        }
    }

    // Each path is dependency-complete and ordered, so the union above is
    // already topologically sorted. Verify the invariant rather than trust it.
    for (i, join) in joins.iter().enumerate() {
        for dep in &join.depends_on {
            let satisfied =
                dep == catalog.base_table() || joins[..i].iter().any(|j| &j.table == dep);
            if !satisfied {
                return Err(ValidationError::UnreachableTable {
                    table: join.table.clone(),
                    context: format!("join depends on '{}' which is not joined", dep),
                });
            }
        }
    }

    tracing::debug!(
        explore = catalog.explore_name(),
        tables = referenced.len(),
        joins = joins.len(),
        "joins resolved"
    );

    Ok(ResolvedQuery { validated, joins })
}

/// Tables the query touches, in first-reference order: selected dimensions
/// and metrics first (request order), then filter leaves in declaration
/// order. Sorts and table calculations only reference selected columns, so
/// they never add tables.
fn referenced_tables(validated: &ValidatedQuery, catalog: &FieldCatalog) -> Vec<String> {
    let mut tables: Vec<String> = vec![catalog.base_table().to_string()];
    let mut push = |table: &str, tables: &mut Vec<String>| {
        if !tables.iter().any(|t| t == table) {
            tables.push(table.to_string());
        }
    };

    let mut add_field = |id: &FieldId, kind: HandleKind, tables: &mut Vec<String>| match kind {
        HandleKind::Dimension | HandleKind::Metric => {
            if let Some(table) = id.table() {
                push(table, tables);
            }
        }
        HandleKind::AdditionalMetric => {
            if let Some(metric) = validated
                .request()
                .additional_metrics
                .iter()
                .find(|m| &m.id() == id)
            {
                push(&metric.table, tables);
            }
        }
        HandleKind::CustomDimension => {
            if let Some(custom) = validated
                .request()
                .custom_dimensions
                .iter()
                .find(|c| &c.field_id() == id)
            {
                match &custom.kind {
                    CustomDimensionKind::Bucket { base_dimension, .. } => {
                        if let Some(table) = base_dimension.table() {
                            push(table, tables);
                        }
                    }
                    CustomDimensionKind::Sql { sql, .. } => {
                        for reference in calc::scan_references(sql) {
                            if let Some(table) = reference.table() {
                                push(table, tables);
                            }
                        }
                    }
                }
            }
        }
        HandleKind::TableCalculation => {}
    };

    for handle in validated.dimensions() {
        add_field(handle.id(), handle.kind(), &mut tables);
    }
    for handle in validated.metrics() {
        add_field(handle.id(), handle.kind(), &mut tables);
    }
    if let Some(filters) = validated.filters() {
        filters.for_each_leaf(&mut |cmp| {
            if let Some(kind) = validated.kind_of(&cmp.field) {
                add_field(&cmp.field, kind, &mut tables);
            }
        });
    }

    tables
}
