//! SQL dialect abstraction.
//!
//! Each warehouse dialect implements [`SqlDialect`] to resolve the syntax
//! differences that matter to metric queries:
//!
//! - identifier quoting: `"` (PostgreSQL family) vs `` ` `` (BigQuery, MySQL)
//! - aggregate spellings, in particular median/percentile
//! - timezone conversion expressions for date/timestamp bucketing
//! - which calculation functions exist, and under what name
//!
//! Dialects that cannot express a requested aggregate return `None` from
//! [`SqlDialect::emit_aggregate`]; the compiler turns that into a
//! `CompileError` rather than emitting SQL the warehouse would reject.

pub mod helpers;

mod bigquery;
mod duckdb;
mod mysql;
mod postgres;
mod redshift;
mod snowflake;

pub use bigquery::BigQuery;
pub use duckdb::DuckDb;
pub use mysql::MySql;
pub use postgres::Postgres;
pub use redshift::Redshift;
pub use snowflake::Snowflake;

use super::token::{Token, TokenStream};
use crate::model::Aggregation;

/// Dialect behavior. Defaults follow the PostgreSQL/ANSI flavor.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for logging and fingerprints.
    fn name(&self) -> &'static str;

    /// Quote an identifier (alias, table, column).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal. Single quotes with `''` escaping everywhere.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    /// Boolean literal spelling.
    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// `DATE '...'` literal.
    fn format_date_literal(&self, date: &str) -> String {
        format!("DATE '{}'", date)
    }

    /// `TIMESTAMP '...'` literal.
    fn format_timestamp_literal(&self, ts: &str) -> String {
        format!("TIMESTAMP '{}'", ts)
    }

    /// Emit a LIMIT clause.
    fn emit_limit(&self, limit: u64) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Limit)
            .space()
            .push(Token::LitInt(limit as i64));
        ts
    }

    /// String concatenation operator.
    fn concat_operator(&self) -> &'static str {
        "||"
    }

    /// Whether `||` means concatenation (MySQL treats it as OR).
    fn supports_concat_operator(&self) -> bool {
        true
    }

    /// Remap a function name at token serialization time. Unused by the
    /// current dialects; spellings are resolved through `calc_function`.
    fn remap_function(&self, name: &str) -> Option<&'static str> {
        let _ = name;
        None
    }

    /// Render an aggregate over a compiled operand fragment.
    ///
    /// Returns `None` when this dialect cannot express the aggregate.
    fn emit_aggregate(
        &self,
        aggregation: Aggregation,
        operand: &str,
        percentile: Option<f64>,
    ) -> Option<String> {
        helpers::ansi_aggregate(aggregation, operand, percentile)
    }

    /// Wrap a timestamp expression so bucketing happens in the given
    /// timezone. The timezone string is validated before it gets here.
    fn emit_timezone_convert(&self, operand: &str, timezone: &str) -> String {
        format!("({} AT TIME ZONE '{}')", operand, timezone)
    }

    /// SQL spelling for a calculation function, or `None` if this dialect
    /// cannot express it (the calculation then runs in the result mapper).
    fn calc_function(&self, name: &str) -> Option<&'static str> {
        helpers::default_calc_function(name)
    }
}

/// Supported warehouse dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    BigQuery,
    Snowflake,
    Redshift,
    DuckDb,
    MySql,
}

impl Dialect {
    fn imp(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Postgres => &Postgres,
            Dialect::BigQuery => &BigQuery,
            Dialect::Snowflake => &Snowflake,
            Dialect::Redshift => &Redshift,
            Dialect::DuckDb => &DuckDb,
            Dialect::MySql => &MySql,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.imp().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.imp().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.imp().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.imp().format_bool(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        self.imp().format_date_literal(date)
    }

    fn format_timestamp_literal(&self, ts: &str) -> String {
        self.imp().format_timestamp_literal(ts)
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        self.imp().emit_limit(limit)
    }

    fn concat_operator(&self) -> &'static str {
        self.imp().concat_operator()
    }

    fn supports_concat_operator(&self) -> bool {
        self.imp().supports_concat_operator()
    }

    fn remap_function(&self, name: &str) -> Option<&'static str> {
        self.imp().remap_function(name)
    }

    fn emit_aggregate(
        &self,
        aggregation: Aggregation,
        operand: &str,
        percentile: Option<f64>,
    ) -> Option<String> {
        self.imp().emit_aggregate(aggregation, operand, percentile)
    }

    fn emit_timezone_convert(&self, operand: &str, timezone: &str) -> String {
        self.imp().emit_timezone_convert(operand, timezone)
    }

    fn calc_function(&self, name: &str) -> Option<&'static str> {
        self.imp().calc_function(name)
    }
}
