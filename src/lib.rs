//! # Prism
//!
//! Metric query compilation and result mapping for a semantic BI layer.
//!
//! Callers declare an abstract metric query (dimensions, metrics, filters,
//! sorts, inline definitions, table calculations) against a governed explore;
//! Prism validates it, compiles deterministic warehouse SQL, and maps the raw
//! rows back into typed, formatted, traceable result rows.
//!
//! ## Pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        MetricQuery (declarative request)                 │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [validate]
//! ┌─────────────────────────────────────────────────────────┐
//! │        ValidatedQuery (typed field handles)              │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [resolve]
//! ┌─────────────────────────────────────────────────────────┐
//! │        ResolvedQuery (deterministic join plan)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compile]
//! ┌─────────────────────────────────────────────────────────┐
//! │        CompiledQuery (SQL + ordered field list)          │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [warehouse client - external]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Result mapping (typed rows, drill-down)           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Compilation is pure and side-effect-free; the warehouse round trip is the
//! only suspension point. The [`catalog::FieldCatalog`] is an immutable
//! snapshot shared across concurrent requests and rebuilt wholesale when the
//! explore definition changes.

pub mod calc;
pub mod catalog;
pub mod compile;
pub mod drill;
pub mod error;
pub mod model;
pub mod query;
pub mod resolve;
pub mod results;
pub mod runner;
pub mod sql;
pub mod validate;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::catalog::{CatalogItem, FieldCatalog};
    pub use crate::compile::{compile, CompiledQuery};
    pub use crate::drill::{resolve_drill_down, UnderlyingDataConfig};
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::model::{
        Aggregation, Dimension, Explore, ExploreJoin, ExploreTable, Field, FieldId,
        FormatOptions, JoinKind, Metric, SemanticType,
    };
    pub use crate::query::{
        AdditionalMetric, BoolOp, BucketRange, CustomDimension, CustomDimensionKind,
        FilterComparison, FilterGroup, FilterNode, FilterOperator, MetricQuery, SortSpec,
        TableCalculation,
    };
    pub use crate::resolve::resolve_joins;
    pub use crate::results::{RawValue, ResultMapper, ResultRow, ResultValue};
    pub use crate::runner::{
        abort_pair, ApiQueryResults, CacheMetadata, ExecutionError, QueryRunner, RowStream,
        WarehouseClient,
    };
    pub use crate::sql::Dialect;
    pub use crate::validate::{validate, ValidatedQuery, ValidationError};
}

// Common entry points at the crate root.
pub use catalog::FieldCatalog;
pub use error::{CoreError, CoreResult};
pub use model::FieldId;
pub use query::MetricQuery;
pub use runner::QueryRunner;
pub use sql::Dialect;
