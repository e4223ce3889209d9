//! Snowflake dialect.
//!
//! ANSI quoting and aggregates; timezone conversion via `CONVERT_TIMEZONE`.

use super::helpers;
use super::SqlDialect;

#[derive(Debug, Clone, Copy)]
pub struct Snowflake;

impl SqlDialect for Snowflake {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn emit_timezone_convert(&self, operand: &str, timezone: &str) -> String {
        format!("CONVERT_TIMEZONE('{}', {})", timezone, operand)
    }
}
