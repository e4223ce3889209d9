//! Shared helpers for dialect implementations.

/// ANSI double-quote identifier quoting (PostgreSQL, Snowflake, Redshift,
/// DuckDB).
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Backtick identifier quoting (BigQuery, MySQL).
pub fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Standard aggregate emission shared by the ANSI-flavored dialects.
///
/// Returns `None` when the aggregate has no standard spelling (the dialect
/// must override or reject it).
pub fn ansi_aggregate(
    aggregation: crate::model::Aggregation,
    operand: &str,
    percentile: Option<f64>,
) -> Option<String> {
    use crate::model::Aggregation::*;
    match aggregation {
        Count => Some(format!("COUNT({})", operand)),
        CountDistinct => Some(format!("COUNT(DISTINCT {})", operand)),
        Sum => Some(format!("SUM({})", operand)),
        Avg => Some(format!("AVG({})", operand)),
        Min => Some(format!("MIN({})", operand)),
        Max => Some(format!("MAX({})", operand)),
        Median => Some(format!(
            "PERCENTILE_CONT(0.5) WITHIN GROUP (ORDER BY {})",
            operand
        )),
        Percentile => percentile.map(|p| {
            format!(
                "PERCENTILE_CONT({}) WITHIN GROUP (ORDER BY {})",
                format_fraction(p),
                operand
            )
        }),
    }
}

/// Calculation function spellings shared by every dialect that supports the
/// whole set. `if` never appears here: it always renders as CASE.
pub fn default_calc_function(name: &str) -> Option<&'static str> {
    match name {
        "abs" => Some("ABS"),
        "round" => Some("ROUND"),
        "floor" => Some("FLOOR"),
        "ceil" => Some("CEIL"),
        "coalesce" => Some("COALESCE"),
        "nullif" => Some("NULLIF"),
        "greatest" => Some("GREATEST"),
        "least" => Some("LEAST"),
        "power" => Some("POWER"),
        "sqrt" => Some("SQRT"),
        "ln" => Some("LN"),
        "exp" => Some("EXP"),
        "concat" => Some("CONCAT"),
        "upper" => Some("UPPER"),
        "lower" => Some("LOWER"),
        "initcap" => Some("INITCAP"),
        _ => None,
    }
}

/// Render a fraction without trailing noise: `0.5`, `0.95`.
pub fn format_fraction(p: f64) -> String {
    let mut buffer = ryu::Buffer::new();
    buffer.format(p).to_string()
}
