//! Typed result values and rows.
//!
//! Warehouse rows arrive as JSON objects keyed by column alias; the mapper
//! turns them into [`ResultRow`]s where every output field has a
//! [`ResultValue`] pairing the warehouse-native value with a display string.

pub mod format;
pub mod mapper;

pub use format::format_value;
pub use mapper::{JsonRow, MapStreamError, MappingError, ResultMapper};

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::model::{FieldId, SemanticType};

/// A warehouse-native value. `Date`/`Timestamp` values are naive: timezone
/// conversion happens inside the generated SQL, so the warehouse already
/// returned wall-clock values.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    /// Numeric view, for calculation evaluation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int(i) => Some(*i as f64),
            RawValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Convert a JSON value from the warehouse into a typed raw value, guided
    /// by the field's semantic type. Unparseable temporal strings fall back to
    /// plain strings rather than failing the row.
    pub fn from_json(value: &Value, semantic_type: SemanticType) -> RawValue {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RawValue::Int(i)
                } else {
                    RawValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => match semantic_type {
                SemanticType::Date => parse_date(s)
                    .map(RawValue::Date)
                    .unwrap_or_else(|| RawValue::String(s.clone())),
                SemanticType::Timestamp => parse_timestamp(s)
                    .map(RawValue::Timestamp)
                    .unwrap_or_else(|| RawValue::String(s.clone())),
                SemanticType::Number => s
                    .parse::<i64>()
                    .map(RawValue::Int)
                    .or_else(|_| s.parse::<f64>().map(RawValue::Float))
                    .unwrap_or_else(|_| RawValue::String(s.clone())),
                _ => RawValue::String(s.clone()),
            },
            // Arrays/objects are not part of the field model; keep their JSON
            // text so nothing is silently dropped.
            other => RawValue::String(other.to_string()),
        }
    }

    /// Back to JSON, for filter pinning and response serialization.
    pub fn to_json(&self) -> Value {
        match self {
            RawValue::Null => Value::Null,
            RawValue::Bool(b) => Value::Bool(*b),
            RawValue::Int(i) => Value::from(*i),
            RawValue::Float(f) => Value::from(*f),
            RawValue::String(s) => Value::String(s.clone()),
            RawValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            RawValue::Timestamp(t) => Value::String(t.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| s.get(..10).and_then(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok()))
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const PATTERNS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];
    PATTERNS
        .iter()
        .find_map(|p| NaiveDateTime::parse_from_str(s, p).ok())
        .or_else(|| {
            // RFC 3339 with an offset: keep the wall-clock part.
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

/// One cell: the warehouse value plus its display string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultValue {
    pub raw: RawValue,
    pub formatted: String,
}

/// One mapped row. Holds a value for every output field of the compiled
/// query, in the compiled query's column order; serializes as a JSON object
/// in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    ids: Arc<Vec<FieldId>>,
    values: Vec<ResultValue>,
}

impl ResultRow {
    pub(crate) fn new(ids: Arc<Vec<FieldId>>, values: Vec<ResultValue>) -> Self {
        debug_assert_eq!(ids.len(), values.len());
        Self { ids, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn field_ids(&self) -> &[FieldId] {
        &self.ids
    }

    pub fn get(&self, id: &FieldId) -> Option<&ResultValue> {
        self.ids
            .iter()
            .position(|candidate| candidate == id)
            .map(|i| &self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &ResultValue)> {
        self.ids.iter().zip(self.values.iter())
    }
}

impl Serialize for ResultRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (id, value) in self.iter() {
            map.serialize_entry(id.as_str(), value)?;
        }
        map.end()
    }
}
