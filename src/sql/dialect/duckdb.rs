//! DuckDB dialect.
//!
//! ANSI quoting with a native `MEDIAN`/`QUANTILE_CONT` and no `INITCAP`
//! string function, so calculations using `initcap` run in the result mapper.

use crate::model::Aggregation;

use super::helpers;
use super::SqlDialect;

#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn emit_aggregate(
        &self,
        aggregation: Aggregation,
        operand: &str,
        percentile: Option<f64>,
    ) -> Option<String> {
        match aggregation {
            Aggregation::Median => Some(format!("MEDIAN({})", operand)),
            Aggregation::Percentile => percentile.map(|p| {
                format!(
                    "QUANTILE_CONT({}, {})",
                    operand,
                    helpers::format_fraction(p)
                )
            }),
            other => helpers::ansi_aggregate(other, operand, percentile),
        }
    }

    fn calc_function(&self, name: &str) -> Option<&'static str> {
        match name {
            "initcap" => None,
            other => helpers::default_calc_function(other),
        }
    }
}
