//! Amazon Redshift dialect.
//!
//! PostgreSQL-derived: ANSI quoting and aggregates, `CONVERT_TIMEZONE` for
//! timezone conversion.

use super::helpers;
use super::SqlDialect;

#[derive(Debug, Clone, Copy)]
pub struct Redshift;

impl SqlDialect for Redshift {
    fn name(&self) -> &'static str {
        "redshift"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn emit_timezone_convert(&self, operand: &str, timezone: &str) -> String {
        format!("CONVERT_TIMEZONE('{}', {})", timezone, operand)
    }
}
