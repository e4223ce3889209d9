//! Underlying-data resolution (drill-down).
//!
//! Given an aggregated result cell and its source row, derives a new
//! declarative query returning the ungrouped rows behind that cell: the
//! original grouping dimensions pinned to the row's values, no metrics, and a
//! flat row limit. The derived query re-enters the normal pipeline at
//! validation.

use std::collections::HashMap;

use serde_json::Value;

use crate::catalog::FieldCatalog;
use crate::model::{Field, FieldId};
use crate::query::{
    FilterComparison, FilterNode, FilterOperator, MetricQuery,
};
use crate::results::ResultRow;
use crate::validate::ValidationError;

/// Row cap for drill-down fetches; underlying data is for inspection, not
/// export.
pub const DRILL_LIMIT: u64 = 500;

/// A drill-down request: the clicked item, the clicked cell's raw value, and
/// the source row's raw values keyed by field id.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UnderlyingDataConfig {
    pub item: FieldId,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub field_values: HashMap<FieldId, Value>,
    /// Explicit dimension selection override.
    #[serde(default)]
    pub dimensions_ids: Option<Vec<FieldId>>,
}

impl UnderlyingDataConfig {
    /// Build a config from a mapped result row, the way a "view underlying
    /// data" click does.
    pub fn from_row(item: FieldId, row: &ResultRow) -> Self {
        let value = row.get(&item).map(|v| v.raw.to_json());
        let field_values = row
            .iter()
            .map(|(id, v)| (id.clone(), v.raw.to_json()))
            .collect();
        Self {
            item,
            value,
            field_values,
            dimensions_ids: None,
        }
    }
}

/// Derive the underlying-data query for one result cell.
pub fn resolve_drill_down(
    original: &MetricQuery,
    catalog: &FieldCatalog,
    config: &UnderlyingDataConfig,
) -> Result<MetricQuery, ValidationError> {
    // The clicked item decides the join context and any drill hints.
    let (item_table, hints) = locate_item(original, catalog, &config.item)?;

    // Join reachability comes from the catalog's precomputed paths; an item
    // on an unreachable table can never be drilled.
    if let Some(table) = &item_table {
        if catalog.join_path(table).is_none() {
            return Err(ValidationError::UnreachableTable {
                table: table.clone(),
                context: format!("drill-down on '{}'", config.item),
            });
        }
    }

    let dimensions = match &config.dimensions_ids {
        Some(explicit) => explicit.clone(),
        None if !hints.is_empty() => resolve_hints(&hints, item_table.as_deref(), catalog),
        None => default_dimensions(original, catalog, item_table.as_deref()),
    };

    // Pin every selected dimension of the original query to the source row's
    // value. Null pins become IS NULL.
    let mut pins = Vec::new();
    for id in &original.dimensions {
        let Some(value) = config.field_values.get(id) else {
            continue;
        };
        let comparison = match value {
            Value::Null => FilterComparison {
                field: id.clone(),
                op: FilterOperator::IsNull,
                values: vec![],
            },
            other => FilterComparison {
                field: id.clone(),
                op: FilterOperator::Equals,
                values: vec![other.clone()],
            },
        };
        pins.push(FilterNode::Compare(comparison));
    }

    // Original dimension filters keep narrowing the rows; metric (HAVING)
    // filters no longer apply to an ungrouped fetch.
    if let Some(filters) = &original.filters {
        if let Some(kept) = dimension_only(filters, original, catalog) {
            pins.push(kept);
        }
    }

    let filters = match pins.len() {
        0 => None,
        1 => Some(pins.into_iter().next().expect("one pin")),
        _ => Some(FilterNode::and(pins)),
    };

    tracing::debug!(
        item = %config.item,
        dimensions = dimensions.len(),
        "drill-down query derived"
    );

    Ok(MetricQuery {
        explore_name: original.explore_name.clone(),
        dimensions,
        metrics: vec![],
        filters,
        sorts: vec![],
        limit: Some(DRILL_LIMIT),
        table_calculations: vec![],
        additional_metrics: vec![],
        // Custom dimensions stay available so pins on them still resolve.
        custom_dimensions: original.custom_dimensions.clone(),
        timezone: original.timezone.clone(),
    })
}

/// Find the clicked item and its drill hints.
fn locate_item(
    original: &MetricQuery,
    catalog: &FieldCatalog,
    item: &FieldId,
) -> Result<(Option<String>, Vec<String>), ValidationError> {
    if let Some(compiled) = catalog.resolve(item) {
        let hints = match &compiled.field {
            Field::Metric(metric) => metric.show_underlying_values.clone(),
            Field::Dimension(_) => vec![],
        };
        return Ok((Some(compiled.field.table().to_string()), hints));
    }
    if let Some(additional) = original
        .additional_metrics
        .iter()
        .find(|m| &m.id() == item)
    {
        return Ok((Some(additional.table.clone()), vec![]));
    }
    if original
        .custom_dimensions
        .iter()
        .any(|c| &c.field_id() == item)
        || original
            .table_calculations
            .iter()
            .any(|c| &c.field_id() == item)
    {
        // Inline items have no owning table; the base table's context is used.
        return Ok((None, vec![]));
    }
    Err(ValidationError::UnknownField {
        field: item.clone(),
        context: "drill-down item".to_string(),
    })
}

/// Resolve `show_underlying_values` hints: bare names are relative to the
/// item's table. Unknown hints are skipped rather than failing the drill.
fn resolve_hints(
    hints: &[String],
    item_table: Option<&str>,
    catalog: &FieldCatalog,
) -> Vec<FieldId> {
    let mut dimensions = Vec::new();
    for hint in hints {
        let id = if hint.contains('.') {
            FieldId::from(hint.as_str())
        } else {
            match item_table {
                Some(table) => FieldId::new(table, hint),
                None => FieldId::from(hint.as_str()),
            }
        };
        match catalog.resolve(&id) {
            Some(compiled) if compiled.field.is_dimension() => dimensions.push(id),
            _ => tracing::warn!(hint = %hint, "drill hint does not name a dimension; skipped"),
        }
    }
    dimensions
}

/// Without hints or an explicit override: every visible dimension of the
/// tables the original query touches, plus the clicked item's table.
fn default_dimensions(
    original: &MetricQuery,
    catalog: &FieldCatalog,
    item_table: Option<&str>,
) -> Vec<FieldId> {
    let add = |id: &FieldId, tables: &mut Vec<String>| {
        if let Some(compiled) = catalog.resolve(id) {
            let table = compiled.field.table().to_string();
            if !tables.contains(&table) {
                tables.push(table);
            }
        }
    };

    let mut touched: Vec<String> = vec![catalog.base_table().to_string()];
    for id in original.dimensions.iter().chain(original.metrics.iter()) {
        add(id, &mut touched);
    }
    if let Some(filters) = &original.filters {
        filters.for_each_leaf(&mut |cmp| add(&cmp.field, &mut touched));
    }
    if let Some(table) = item_table {
        if !touched.iter().any(|t| t == table) {
            touched.push(table.to_string());
        }
    }

    catalog
        .all_fields()
        .filter(|compiled| {
            compiled.field.is_dimension()
                && !compiled.field.hidden()
                && touched.iter().any(|t| t == compiled.field.table())
        })
        .map(|compiled| compiled.field.id())
        .collect()
}

/// Keep only the parts of a filter tree whose leaves are dimension-side.
fn dimension_only(
    node: &FilterNode,
    original: &MetricQuery,
    catalog: &FieldCatalog,
) -> Option<FilterNode> {
    let is_aggregate = |field: &FieldId| -> bool {
        if let Some(compiled) = catalog.resolve(field) {
            return compiled.field.is_metric();
        }
        original.additional_metrics.iter().any(|m| &m.id() == field)
    };

    match node {
        FilterNode::Compare(cmp) => {
            if is_aggregate(&cmp.field) {
                None
            } else {
                Some(FilterNode::Compare(cmp.clone()))
            }
        }
        FilterNode::Group(group) => {
            let kept: Vec<FilterNode> = group
                .children
                .iter()
                .filter_map(|child| dimension_only(child, original, catalog))
                .collect();
            match group.op {
                // Dropping one branch of an OR widens it; drop the whole
                // group unless every branch survived.
                crate::query::BoolOp::Or if kept.len() != group.children.len() => None,
                _ if kept.is_empty() => None,
                op => Some(FilterNode::Group(crate::query::FilterGroup {
                    op,
                    children: kept,
                })),
            }
        }
    }
}
