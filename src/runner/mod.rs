//! Pipeline orchestration.
//!
//! [`QueryRunner`] drives the linear query lifecycle: validate, resolve
//! joins, compile, execute against a [`WarehouseClient`], map rows. Every
//! stage before execution is pure and synchronous; execution is the single
//! suspension point, wrapped in an abortable stream so a caller timeout or
//! disconnect stops consumption without leaking the stream.

pub mod cache;

pub use cache::CacheMetadata;

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;

use async_trait::async_trait;
use futures::stream::{AbortHandle, AbortRegistration, Abortable, BoxStream, Stream, StreamExt};
use serde::Serialize;
use thiserror::Error;

use crate::catalog::FieldCatalog;
use crate::compile::{compile, CompiledQuery};
use crate::error::{CoreError, CoreResult};
use crate::model::{FieldId, SemanticType};
use crate::query::MetricQuery;
use crate::resolve::resolve_joins;
use crate::results::{JsonRow, ResultMapper, ResultRow};
use crate::sql::{Dialect, SqlDialect};
use crate::validate::{validate, HandleKind};

/// Rows as delivered by the warehouse client, keyed by column alias.
pub type RowStream = BoxStream<'static, Result<JsonRow, ExecutionError>>;

/// A warehouse-side failure. Surfaced to the caller with the underlying
/// message preserved; retry policy, if any, belongs to the client.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("warehouse connection failed: {message}")]
    Connection { message: String },

    #[error("warehouse rejected the query: {message}")]
    Warehouse { message: String },

    #[error("query execution timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("query execution was cancelled")]
    Cancelled,
}

/// Executes compiled SQL and streams rows back. Implementations live outside
/// the core (per-warehouse drivers); tests use in-memory fakes.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    async fn execute(&self, query: &CompiledQuery) -> Result<RowStream, ExecutionError>;
}

/// Display-oriented description of one output field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub id: FieldId,
    pub label: String,
    pub kind: &'static str,
    pub semantic_type: SemanticType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

/// A complete, materialized query response.
#[derive(Debug, Serialize)]
pub struct ApiQueryResults {
    /// Echo of the request this result answers.
    pub metric_query: MetricQuery,
    pub cache_metadata: CacheMetadata,
    pub rows: Vec<ResultRow>,
    pub fields: BTreeMap<String, FieldDescriptor>,
}

impl ApiQueryResults {
    /// Replace the cache metadata, preserving the fingerprint. Used by the
    /// external cache layer when serving a stored result.
    pub fn with_cache_metadata(mut self, metadata: CacheMetadata) -> Self {
        self.cache_metadata = metadata;
        self
    }
}

/// A response whose rows are still streaming. `rows` must be consumed (or
/// dropped, which closes the warehouse stream).
pub struct StreamingResults {
    pub metric_query: MetricQuery,
    pub cache_metadata: CacheMetadata,
    pub fields: BTreeMap<String, FieldDescriptor>,
    pub rows: BoxStream<'static, CoreResult<ResultRow>>,
}

/// Runs metric queries against one catalog snapshot and dialect.
///
/// Holds the catalog behind an `Arc`: snapshots are immutable and shared
/// freely across concurrent runners.
#[derive(Clone)]
pub struct QueryRunner {
    catalog: Arc<FieldCatalog>,
    dialect: Dialect,
}

impl QueryRunner {
    pub fn new(catalog: Arc<FieldCatalog>, dialect: Dialect) -> Self {
        Self { catalog, dialect }
    }

    pub fn catalog(&self) -> &Arc<FieldCatalog> {
        &self.catalog
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Validate, resolve, and compile without executing.
    pub fn compile_query(&self, query: MetricQuery) -> CoreResult<CompiledQuery> {
        let validated = validate(query, &self.catalog).map_err(CoreError::Validation)?;
        let resolved = resolve_joins(validated, &self.catalog)
            .map_err(|error| CoreError::Validation(vec![error]))?;
        let compiled = compile(&resolved, &self.catalog, self.dialect)?;
        Ok(compiled)
    }

    /// Run a query to completion and materialize every row.
    pub async fn run(
        &self,
        query: MetricQuery,
        client: &dyn WarehouseClient,
    ) -> CoreResult<ApiQueryResults> {
        let (_handle, registration) = AbortHandle::new_pair();
        self.run_cancellable(query, client, registration).await
    }

    /// Run a query with a wall-clock deadline covering execution and
    /// mapping. Deadline expiry drops the row stream and surfaces
    /// [`ExecutionError::Timeout`].
    pub async fn run_with_timeout(
        &self,
        query: MetricQuery,
        client: &dyn WarehouseClient,
        deadline: std::time::Duration,
    ) -> CoreResult<ApiQueryResults> {
        match tokio::time::timeout(deadline, self.run(query, client)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(seconds = deadline.as_secs(), "metric query timed out");
                Err(ExecutionError::Timeout {
                    seconds: deadline.as_secs(),
                }
                .into())
            }
        }
    }

    /// Run a query that the caller can abort through the paired
    /// [`AbortHandle`]. On abort the row stream is dropped and
    /// [`ExecutionError::Cancelled`] is returned; no further rows are mapped.
    pub async fn run_cancellable(
        &self,
        query: MetricQuery,
        client: &dyn WarehouseClient,
        registration: AbortRegistration,
    ) -> CoreResult<ApiQueryResults> {
        let compiled = Arc::new(self.compile_query(query)?);
        let mapper = ResultMapper::new(Arc::clone(&compiled));

        tracing::info!(
            explore = %compiled.explore_name,
            dialect = self.dialect.name(),
            fingerprint = %compiled.fingerprint,
            "executing metric query"
        );

        let rows = client.execute(&compiled).await?;
        let mut abortable = Abortable::new(rows, registration);

        let mut mapped = Vec::new();
        while let Some(item) = abortable.next().await {
            let raw = item.map_err(CoreError::Execution)?;
            mapped.push(mapper.map_row(&raw).map_err(CoreError::Mapping)?);
        }
        if abortable.is_aborted() {
            tracing::warn!(fingerprint = %compiled.fingerprint, "query cancelled by caller");
            return Err(ExecutionError::Cancelled.into());
        }

        tracing::info!(
            fingerprint = %compiled.fingerprint,
            rows = mapped.len(),
            "metric query complete"
        );

        Ok(ApiQueryResults {
            metric_query: compiled.metric_query.clone(),
            cache_metadata: CacheMetadata::miss(&compiled.fingerprint),
            rows: mapped,
            fields: field_descriptors(&compiled),
        })
    }

    /// Run a query, mapping rows lazily as the warehouse delivers them.
    ///
    /// Cancellation through the registration ends the stream with a final
    /// [`ExecutionError::Cancelled`] item.
    pub async fn run_streaming(
        &self,
        query: MetricQuery,
        client: &dyn WarehouseClient,
        registration: AbortRegistration,
    ) -> CoreResult<StreamingResults> {
        let compiled = Arc::new(self.compile_query(query)?);
        let mapper = ResultMapper::new(Arc::clone(&compiled));
        let rows = client.execute(&compiled).await?;
        let mut abortable = Abortable::new(rows, registration);
        let mut cancelled_reported = false;

        let mapped = futures::stream::poll_fn(move |cx| {
            match Pin::new(&mut abortable).poll_next(cx) {
                Poll::Ready(Some(Ok(row))) => Poll::Ready(Some(
                    mapper.map_row(&row).map_err(CoreError::Mapping),
                )),
                Poll::Ready(Some(Err(error))) => {
                    Poll::Ready(Some(Err(CoreError::Execution(error))))
                }
                Poll::Ready(None) => {
                    if abortable.is_aborted() && !cancelled_reported {
                        cancelled_reported = true;
                        Poll::Ready(Some(Err(CoreError::Execution(
                            ExecutionError::Cancelled,
                        ))))
                    } else {
                        Poll::Ready(None)
                    }
                }
                Poll::Pending => Poll::Pending,
            }
        });

        Ok(StreamingResults {
            metric_query: compiled.metric_query.clone(),
            cache_metadata: CacheMetadata::miss(&compiled.fingerprint),
            fields: field_descriptors(&compiled),
            rows: mapped.boxed(),
        })
    }
}

fn field_descriptors(compiled: &CompiledQuery) -> BTreeMap<String, FieldDescriptor> {
    compiled
        .fields
        .iter()
        .map(|field| {
            (
                field.id.as_str().to_string(),
                FieldDescriptor {
                    id: field.id.clone(),
                    label: field.label.clone(),
                    kind: match field.kind {
                        HandleKind::Dimension => "dimension",
                        HandleKind::Metric => "metric",
                        HandleKind::AdditionalMetric => "additional_metric",
                        HandleKind::CustomDimension => "custom_dimension",
                        HandleKind::TableCalculation => "table_calculation",
                    },
                    semantic_type: field.semantic_type,
                    table: field.table.clone(),
                },
            )
        })
        .collect()
}

/// Build a paired abort handle and registration for cancellable runs.
pub fn abort_pair() -> (AbortHandle, AbortRegistration) {
    AbortHandle::new_pair()
}
