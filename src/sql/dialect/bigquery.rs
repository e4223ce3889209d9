//! BigQuery (GoogleSQL) dialect.
//!
//! Backtick quoting, no `PERCENTILE_CONT` as an aggregate - medians and
//! percentiles go through `APPROX_QUANTILES` - and timezone conversion via
//! `DATETIME(ts, tz)`.

use crate::model::Aggregation;

use super::helpers;
use super::SqlDialect;

#[derive(Debug, Clone, Copy)]
pub struct BigQuery;

impl SqlDialect for BigQuery {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn emit_aggregate(
        &self,
        aggregation: Aggregation,
        operand: &str,
        percentile: Option<f64>,
    ) -> Option<String> {
        match aggregation {
            Aggregation::Median => Some(format!("APPROX_QUANTILES({}, 100)[OFFSET(50)]", operand)),
            Aggregation::Percentile => percentile.map(|p| {
                let offset = (p * 100.0).round() as i64;
                format!("APPROX_QUANTILES({}, 100)[OFFSET({})]", operand, offset)
            }),
            other => helpers::ansi_aggregate(other, operand, percentile),
        }
    }

    fn emit_timezone_convert(&self, operand: &str, timezone: &str) -> String {
        format!("DATETIME({}, '{}')", operand, timezone)
    }
}
