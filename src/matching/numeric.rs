//! Numeric parsing and value normalization
//!
//! Expected cells and decoded stream values meet here: decimals are compared
//! exactly via `rust_decimal`, never through `f64` arithmetic, and numbers
//! written with either `.` or `,` as the decimal separator parse to the same
//! value. When both separators appear, the one occurring later in the string
//! is the decimal point and the other is stripped as a grouping separator.

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use std::sync::LazyLock;

const NUMBER_PATTERN: &str = r"[+-]?\d+(?:[.,]\d+)?";

static PLUS_MINUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*({NUMBER_PATTERN})\s*\+\-\s*({NUMBER_PATTERN})\s*$"
    ))
    .expect("static pattern")
});
static PLUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*({NUMBER_PATTERN})\s*\+\s*({NUMBER_PATTERN})\s*$"
    ))
    .expect("static pattern")
});
static MINUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^\s*({NUMBER_PATTERN})\s*\-\s*({NUMBER_PATTERN})\s*$"
    ))
    .expect("static pattern")
});

/// True when the string matches one of the three tolerance grammars
/// (`C+-T`, `C+T`, `C-T`).
pub(crate) fn is_tolerance_expression(value: &str) -> bool {
    PLUS_MINUS.is_match(value) || PLUS.is_match(value) || MINUS.is_match(value)
}

/// Evaluate a tolerance expression against an actual value.
///
/// Returns `None` when the expected value is not a tolerance expression or the
/// actual value is not numeric; the caller then falls back to other
/// comparisons. `Some(bool)` is the band verdict.
pub(crate) fn match_tolerance_expression(expected: &Value, actual: &Value) -> Option<bool> {
    let Value::String(text) = expected else {
        return None;
    };
    let actual_number = parse_decimal(actual)?;
    let text = text.trim();

    if let Some(caps) = PLUS_MINUS.captures(text) {
        return Some(evaluate_band(&caps, |actual, center, tolerance| {
            (actual - center).abs() <= tolerance
        }, actual_number));
    }
    if let Some(caps) = PLUS.captures(text) {
        return Some(evaluate_band(&caps, |actual, center, tolerance| {
            actual <= center + tolerance
        }, actual_number));
    }
    if let Some(caps) = MINUS.captures(text) {
        return Some(evaluate_band(&caps, |actual, center, tolerance| {
            actual >= center - tolerance
        }, actual_number));
    }
    None
}

fn evaluate_band(
    caps: &regex::Captures<'_>,
    verdict: impl Fn(Decimal, Decimal, Decimal) -> bool,
    actual: Decimal,
) -> bool {
    let center = parse_decimal_text(&caps[1]);
    let tolerance = parse_decimal_text(&caps[2]);
    match (center, tolerance) {
        (Some(center), Some(tolerance)) => verdict(actual, center, tolerance),
        _ => false,
    }
}

/// Parse a JSON value as an exact decimal, if it plausibly is one.
///
/// Booleans and nulls are never numbers; strings are trimmed and parsed with
/// locale-aware separator handling; JSON numbers go through their canonical
/// rendering so floats compare by their shortest round-trip representation.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Null | Value::Bool(_) => None,
        Value::Number(n) => parse_plain_decimal(&n.to_string()),
        Value::String(s) => {
            let stripped = s.trim();
            if stripped.is_empty() {
                return None;
            }
            parse_decimal_text(stripped)
        }
        _ => None,
    }
}

fn parse_decimal_text(text: &str) -> Option<Decimal> {
    parse_plain_decimal(&normalize_decimal_separators(text.trim()))
}

fn parse_plain_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

fn normalize_decimal_separators(value: &str) -> String {
    let has_comma = value.contains(',');
    let has_dot = value.contains('.');
    if has_comma && has_dot {
        let last_comma = value.rfind(',').unwrap_or(0);
        let last_dot = value.rfind('.').unwrap_or(0);
        if last_comma > last_dot {
            return value.replace('.', "").replace(',', ".");
        }
        return value.replace(',', "");
    }
    if has_comma {
        return value.replace('.', "").replace(',', ".");
    }
    value.to_string()
}

/// Canonical display form used both for string comparison and for rendering
/// mismatches: trimmed strings, lowercase `true`/`false`, compact JSON with
/// sorted object keys for maps and arrays, `""` for nulls.
pub fn normalize_comparison_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Object(_) | Value::Array(_) => value.to_string(),
        Value::Number(n) => n.to_string(),
    }
}
