//! Field definitions - dimensions, metrics, and their shared attributes.
//!
//! A field is the atomic queryable unit of an explore. Dimensions group and
//! filter rows; metrics aggregate them. Both carry a raw SQL template (with a
//! `${TABLE}` placeholder) that the catalog compiles into a table-qualified
//! expression at build time.

use inflector::Inflector;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable field identifier: `table.name` for catalog fields, a bare name for
/// inline definitions (table calculations, custom dimensions).
///
/// Unique within one explore's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// Identifier for a field owned by a table.
    pub fn new(table: &str, name: &str) -> Self {
        Self(format!("{}.{}", table, name))
    }

    /// Identifier for an inline field (table calculation, custom dimension).
    pub fn named(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Owning table, if this is a qualified id.
    pub fn table(&self) -> Option<&str> {
        self.0.split_once('.').map(|(t, _)| t)
    }

    /// Field name without the table qualifier.
    pub fn name(&self) -> &str {
        self.0.split_once('.').map(|(_, n)| n).unwrap_or(&self.0)
    }

    /// Column alias used in generated SQL.
    ///
    /// Several warehouses reject dots inside column aliases, so `orders.status`
    /// becomes `orders_status`.
    pub fn column_alias(&self) -> String {
        self.0.replace('.', "_")
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Semantic type of a field's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Number,
    Boolean,
    Date,
    Timestamp,
}

impl SemanticType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, SemanticType::Number)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, SemanticType::Date | SemanticType::Timestamp)
    }
}

/// Aggregation applied by a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
    Median,
    /// Requires a percentile parameter on the metric definition.
    Percentile,
}

/// Per-field display formatting consumed by the result mapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Decimal places for numeric values.
    pub round: Option<u8>,
    /// Prepended to the formatted value (currency symbol).
    pub prefix: Option<String>,
    /// Appended to the formatted value (unit).
    pub suffix: Option<String>,
    /// Multiply by 100 and append `%`.
    pub percent: bool,
    /// strftime pattern for date/timestamp values.
    pub date_pattern: Option<String>,
    /// Labels for boolean true/false.
    pub true_label: Option<String>,
    pub false_label: Option<String>,
    /// Display string for null values. Defaults to `-`.
    pub null_label: Option<String>,
}

/// A non-aggregated field: groupable and filterable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub table: String,
    /// Raw SQL template, e.g. `${TABLE}.status`.
    pub sql: String,
    pub semantic_type: SemanticType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    /// User attributes required to query this field.
    #[serde(default)]
    pub required_attributes: Vec<String>,
    #[serde(default)]
    pub format: FormatOptions,
}

/// An aggregated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub table: String,
    /// Raw SQL template for the aggregated operand.
    pub sql: String,
    pub aggregation: Aggregation,
    /// Percentile in `0.0..=1.0`, only meaningful for [`Aggregation::Percentile`].
    #[serde(default)]
    pub percentile: Option<f64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub required_attributes: Vec<String>,
    #[serde(default)]
    pub format: FormatOptions,
    /// Dimension names to show when drilling into this metric's underlying
    /// data. Empty means all reachable dimensions.
    #[serde(default)]
    pub show_underlying_values: Vec<String>,
}

/// A dimension or metric, with uniform accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Field {
    Dimension(Dimension),
    Metric(Metric),
}

impl Field {
    pub fn id(&self) -> FieldId {
        match self {
            Field::Dimension(d) => FieldId::new(&d.table, &d.name),
            Field::Metric(m) => FieldId::new(&m.table, &m.name),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Field::Dimension(d) => &d.name,
            Field::Metric(m) => &m.name,
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Field::Dimension(d) => &d.table,
            Field::Metric(m) => &m.table,
        }
    }

    pub fn sql(&self) -> &str {
        match self {
            Field::Dimension(d) => &d.sql,
            Field::Metric(m) => &m.sql,
        }
    }

    /// Display label: explicit label, or the name humanized.
    pub fn label(&self) -> String {
        let explicit = match self {
            Field::Dimension(d) => d.label.as_deref(),
            Field::Metric(m) => m.label.as_deref(),
        };
        explicit
            .map(str::to_string)
            .unwrap_or_else(|| self.name().to_title_case())
    }

    /// Semantic type of the field's output values.
    ///
    /// Aggregates always produce numbers, matching how the catalog projection
    /// classifies metrics.
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            Field::Dimension(d) => d.semantic_type,
            Field::Metric(_) => SemanticType::Number,
        }
    }

    pub fn hidden(&self) -> bool {
        match self {
            Field::Dimension(d) => d.hidden,
            Field::Metric(m) => m.hidden,
        }
    }

    pub fn format(&self) -> &FormatOptions {
        match self {
            Field::Dimension(d) => &d.format,
            Field::Metric(m) => &m.format,
        }
    }

    pub fn is_metric(&self) -> bool {
        matches!(self, Field::Metric(_))
    }

    pub fn is_dimension(&self) -> bool {
        matches!(self, Field::Dimension(_))
    }
}
