//! Result mapping - warehouse rows to typed, formatted result rows.
//!
//! Consumes rows one at a time so large result sets never materialize unless
//! the caller asks for it. Every output field gets a value on every row:
//! aliases missing from a raw row map to an explicit null. An alias the
//! compiled query never produced is a contract breach and fails the row.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;

use crate::calc::eval;
use crate::compile::CompiledQuery;
use crate::model::FieldId;

use super::{format_value, RawValue, ResultRow, ResultValue};

/// Rows as the warehouse client delivers them: JSON objects keyed by the
/// compiled column alias.
pub type JsonRow = serde_json::Map<String, Value>;

/// A row did not match the compiled query's output shape. Internal invariant
/// breach (compiler/warehouse disagreement), not a user error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MappingError {
    #[error("row contains column '{alias}' which is not part of the compiled query")]
    UnexpectedColumn { alias: String },
}

/// Maps raw warehouse rows for one compiled query.
#[derive(Debug, Clone)]
pub struct ResultMapper {
    compiled: Arc<CompiledQuery>,
    ids: Arc<Vec<FieldId>>,
}

impl ResultMapper {
    pub fn new(compiled: Arc<CompiledQuery>) -> Self {
        let ids = Arc::new(compiled.fields.iter().map(|f| f.id.clone()).collect());
        Self { compiled, ids }
    }

    /// Output field ids, in column order.
    pub fn field_ids(&self) -> &[FieldId] {
        &self.ids
    }

    /// Map one raw row.
    pub fn map_row(&self, row: &JsonRow) -> Result<ResultRow, MappingError> {
        for alias in row.keys() {
            if self.compiled.field_by_alias(alias).is_none() {
                tracing::warn!(alias = %alias, "unexpected column in warehouse row");
                return Err(MappingError::UnexpectedColumn {
                    alias: alias.clone(),
                });
            }
        }

        // SQL-backed values first; mapper-evaluated calculations see them.
        let mut raws: HashMap<FieldId, RawValue> = HashMap::with_capacity(self.ids.len());
        for field in &self.compiled.fields {
            if self.compiled.post_calcs.iter().any(|p| p.id == field.id) {
                continue;
            }
            let raw = row
                .get(&field.alias)
                .map(|value| RawValue::from_json(value, field.semantic_type))
                .unwrap_or(RawValue::Null);
            raws.insert(field.id.clone(), raw);
        }
        for post in &self.compiled.post_calcs {
            let value = eval::evaluate(&post.expr, &|id| raws.get(id).cloned());
            raws.insert(post.id.clone(), value);
        }

        let values = self
            .compiled
            .fields
            .iter()
            .map(|field| {
                let raw = raws.remove(&field.id).unwrap_or(RawValue::Null);
                let formatted = format_value(&raw, &field.format);
                ResultValue { raw, formatted }
            })
            .collect();

        Ok(ResultRow::new(Arc::clone(&self.ids), values))
    }

    /// Map a stream of rows lazily. Errors from the underlying stream pass
    /// through; mapping failures surface per row.
    pub fn map_stream<'a, E>(
        &self,
        rows: impl Stream<Item = Result<JsonRow, E>> + 'a,
    ) -> impl Stream<Item = Result<ResultRow, MapStreamError<E>>> + 'a {
        let mapper = self.clone();
        rows.map(move |item| match item {
            Ok(row) => mapper.map_row(&row).map_err(MapStreamError::Mapping),
            Err(source) => Err(MapStreamError::Source(source)),
        })
    }

    /// Materialize a batch, for export and totals.
    pub fn map_rows(&self, rows: &[JsonRow]) -> Result<Vec<ResultRow>, MappingError> {
        rows.iter().map(|row| self.map_row(row)).collect()
    }
}

/// Either a mapping failure or an error from the row source.
#[derive(Debug, Error)]
pub enum MapStreamError<E> {
    #[error(transparent)]
    Mapping(MappingError),
    #[error(transparent)]
    Source(E),
}
