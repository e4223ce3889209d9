//! Semantic model types - explores, tables, fields.

pub mod explore;
pub mod field;

pub use explore::{Explore, ExploreJoin, ExploreTable, JoinKind};
pub use field::{Aggregation, Dimension, Field, FieldId, FormatOptions, Metric, SemanticType};
