//! MySQL dialect.
//!
//! Backtick quoting, `1`/`0` booleans, `||` is logical OR, no ordered-set
//! aggregates (median/percentile are rejected at compile time), no `INITCAP`.

use crate::model::Aggregation;

use super::helpers;
use super::SqlDialect;

#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        if b {
            "1"
        } else {
            "0"
        }
    }

    fn supports_concat_operator(&self) -> bool {
        false
    }

    fn concat_operator(&self) -> &'static str {
        // Unused while supports_concat_operator() is false; CONCAT() is
        // emitted instead.
        "||"
    }

    fn format_timestamp_literal(&self, ts: &str) -> String {
        format!("TIMESTAMP '{}'", ts)
    }

    fn emit_aggregate(
        &self,
        aggregation: Aggregation,
        operand: &str,
        percentile: Option<f64>,
    ) -> Option<String> {
        match aggregation {
            Aggregation::Median | Aggregation::Percentile => None,
            other => helpers::ansi_aggregate(other, operand, percentile),
        }
    }

    fn emit_timezone_convert(&self, operand: &str, timezone: &str) -> String {
        format!("CONVERT_TZ({}, 'UTC', '{}')", operand, timezone)
    }

    fn calc_function(&self, name: &str) -> Option<&'static str> {
        match name {
            "initcap" => None,
            other => helpers::default_calc_function(other),
        }
    }
}
