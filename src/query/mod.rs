//! Declarative metric query - the request shape callers submit.
//!
//! A [`MetricQuery`] names fields by id and is validated against a
//! [`crate::catalog::FieldCatalog`] before anything touches SQL.

pub mod filter;

pub use filter::{BoolOp, FilterComparison, FilterGroup, FilterNode, FilterOperator};

use serde::{Deserialize, Serialize};

use crate::model::{Aggregation, FieldId, FormatOptions, SemanticType};

/// Sort on one output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: FieldId,
    #[serde(default)]
    pub descending: bool,
}

/// A metric defined inline in a query rather than in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalMetric {
    pub name: String,
    /// Owning table; determines the join context the metric pulls in.
    pub table: String,
    /// Raw SQL template for the aggregated operand, e.g. `${TABLE}.amount`.
    pub sql: String,
    pub aggregation: Aggregation,
    #[serde(default)]
    pub percentile: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub format: FormatOptions,
}

impl AdditionalMetric {
    pub fn id(&self) -> FieldId {
        FieldId::new(&self.table, &self.name)
    }
}

/// One bucket of a range custom dimension. Open bounds are half-open:
/// `from <= x < to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRange {
    #[serde(default)]
    pub from: Option<f64>,
    #[serde(default)]
    pub to: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
}

impl BucketRange {
    /// Display label: explicit, or derived from the bounds.
    pub fn display_label(&self) -> String {
        if let Some(label) = &self.label {
            return label.clone();
        }
        match (self.from, self.to) {
            (Some(from), Some(to)) => format!("{} - {}", from, to),
            (Some(from), None) => format!("≥ {}", from),
            (None, Some(to)) => format!("< {}", to),
            (None, None) => "all".to_string(),
        }
    }
}

/// Body of a custom dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomDimensionKind {
    /// Range bucketing over a numeric base dimension, compiled to a CASE
    /// expression.
    Bucket {
        base_dimension: FieldId,
        ranges: Vec<BucketRange>,
    },
    /// Raw SQL fragment with a declared output type.
    Sql {
        sql: String,
        semantic_type: SemanticType,
    },
}

/// A computed dimension defined inline in a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomDimension {
    /// Identifier; referenced from the query's `dimensions` list.
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub kind: CustomDimensionKind,
}

impl CustomDimension {
    pub fn field_id(&self) -> FieldId {
        FieldId::named(&self.id)
    }

    pub fn semantic_type(&self) -> SemanticType {
        match &self.kind {
            CustomDimensionKind::Bucket { .. } => SemanticType::String,
            CustomDimensionKind::Sql { semantic_type, .. } => *semantic_type,
        }
    }
}

/// A named expression computed over already-selected fields, one value per
/// output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCalculation {
    /// Identifier; becomes the output column name.
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    /// Expression over `${table.field}` / `${calculation}` references.
    pub sql: String,
    #[serde(default)]
    pub format: FormatOptions,
}

impl TableCalculation {
    pub fn field_id(&self) -> FieldId {
        FieldId::named(&self.name)
    }
}

/// The declarative request: what to select, filter, and sort against one
/// explore. Field ids may name catalog fields, additional metrics, custom
/// dimensions, or table calculations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricQuery {
    pub explore_name: String,
    #[serde(default)]
    pub dimensions: Vec<FieldId>,
    #[serde(default)]
    pub metrics: Vec<FieldId>,
    #[serde(default)]
    pub filters: Option<FilterNode>,
    #[serde(default)]
    pub sorts: Vec<SortSpec>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub table_calculations: Vec<TableCalculation>,
    #[serde(default)]
    pub additional_metrics: Vec<AdditionalMetric>,
    #[serde(default)]
    pub custom_dimensions: Vec<CustomDimension>,
    /// IANA timezone name applied to date/timestamp bucketing in SQL.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl MetricQuery {
    /// An empty query against one explore.
    pub fn new(explore_name: &str) -> Self {
        Self {
            explore_name: explore_name.to_string(),
            dimensions: vec![],
            metrics: vec![],
            filters: None,
            sorts: vec![],
            limit: None,
            table_calculations: vec![],
            additional_metrics: vec![],
            custom_dimensions: vec![],
            timezone: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_labels() {
        let explicit = BucketRange {
            from: Some(0.0),
            to: Some(10.0),
            label: Some("small".into()),
        };
        assert_eq!(explicit.display_label(), "small");

        let open_end = BucketRange {
            from: Some(100.0),
            to: None,
            label: None,
        };
        assert_eq!(open_end.display_label(), "≥ 100");
    }

    #[test]
    fn test_metric_query_round_trips_through_json() {
        let query = MetricQuery {
            dimensions: vec![FieldId::new("orders", "status")],
            metrics: vec![FieldId::new("orders", "count")],
            limit: Some(50),
            ..MetricQuery::new("orders")
        };
        let json = serde_json::to_string(&query).unwrap();
        let back: MetricQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(query, back);
    }
}
