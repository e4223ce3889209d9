//! Display formatting for raw values.
//!
//! Applies a field's [`FormatOptions`]: rounding, currency prefix/suffix,
//! percentages, date patterns, boolean labels. Null never crashes a cell; it
//! formats as the configured null label.

use std::fmt::Write as _;

use crate::model::FormatOptions;

use super::RawValue;

const DEFAULT_NULL_LABEL: &str = "-";
const DEFAULT_DATE_PATTERN: &str = "%Y-%m-%d";
const DEFAULT_TIMESTAMP_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// Format one raw value for display.
pub fn format_value(raw: &RawValue, format: &FormatOptions) -> String {
    match raw {
        RawValue::Null => format
            .null_label
            .clone()
            .unwrap_or_else(|| DEFAULT_NULL_LABEL.to_string()),

        RawValue::Bool(b) => {
            let label = if *b {
                format.true_label.as_deref().unwrap_or("true")
            } else {
                format.false_label.as_deref().unwrap_or("false")
            };
            label.to_string()
        }

        RawValue::Int(i) => format_number(*i as f64, Some(*i), format),
        RawValue::Float(f) => format_number(*f, None, format),

        RawValue::String(s) => s.clone(),

        RawValue::Date(d) => {
            let pattern = format
                .date_pattern
                .as_deref()
                .unwrap_or(DEFAULT_DATE_PATTERN);
            format_temporal(&d.format(pattern), || {
                d.format(DEFAULT_DATE_PATTERN).to_string()
            })
        }

        RawValue::Timestamp(t) => {
            let pattern = format
                .date_pattern
                .as_deref()
                .unwrap_or(DEFAULT_TIMESTAMP_PATTERN);
            format_temporal(&t.format(pattern), || {
                t.format(DEFAULT_TIMESTAMP_PATTERN).to_string()
            })
        }
    }
}

/// chrono reports bad user patterns through `fmt::Error`; fall back to the
/// default pattern instead of panicking mid-row.
fn format_temporal(
    formatted: &chrono::format::DelayedFormat<chrono::format::StrftimeItems<'_>>,
    fallback: impl Fn() -> String,
) -> String {
    let mut out = String::new();
    match write!(out, "{}", formatted) {
        Ok(()) => out,
        Err(_) => fallback(),
    }
}

fn format_number(value: f64, int_value: Option<i64>, format: &FormatOptions) -> String {
    let mut body = if format.percent {
        let scaled = value * 100.0;
        let digits = format.round.unwrap_or(0) as usize;
        format!("{:.*}%", digits, scaled)
    } else {
        match (format.round, int_value) {
            (Some(digits), _) => format!("{:.*}", digits as usize, value),
            (None, Some(i)) => i.to_string(),
            (None, None) => {
                let mut buffer = ryu::Buffer::new();
                buffer.format(value).to_string()
            }
        }
    };

    if !format.percent {
        if let Some(prefix) = &format.prefix {
            body = format!("{}{}", prefix, body);
        }
        if let Some(suffix) = &format.suffix {
            body.push_str(suffix);
        }
    }
    body
}
