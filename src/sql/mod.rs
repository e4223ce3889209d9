//! SQL generation - tokens, expressions, query builder, dialects.
//!
//! The compiler targets this layer; nothing here knows about explores or
//! metric queries. Serialization is deterministic: the same token stream
//! always yields the same text for a given dialect.

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{col, lit_bool, lit_float, lit_int, lit_null, lit_str, raw, BinaryOperator, Expr, ExprExt, Literal, UnaryOperator};
pub use query::{Cte, FromClause, JoinClause, OrderByExpr, Query, SelectExpr, SqlJoinKind, TableRef};
pub use token::{Token, TokenStream};
