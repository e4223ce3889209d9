//! PostgreSQL dialect.
//!
//! The reference flavor: ANSI quoting, native booleans, `PERCENTILE_CONT`,
//! `AT TIME ZONE`. Most trait defaults describe PostgreSQL already.

use super::helpers;
use super::SqlDialect;

#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }
}
