//! Expectation rules
//!
//! Every expected cell value resolves deterministically into one rule. Rules
//! are stateless and recomputed per validation call.

use serde_json::Value;

use super::numeric::is_tolerance_expression;

/// Reserved sentinel asserting that the actual value must be empty.
/// Case-sensitive; anything else with the same letters is an exact match.
pub const MUST_BE_EMPTY_SENTINEL: &str = "MUSS_LEER_SEIN";

/// Parsed expectation for one expected field value.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectationRule {
    /// Cell is absent or blank: the field is not asserted at all.
    Ignore,
    /// The actual value must be null or an all-whitespace string.
    MustBeEmpty,
    /// Exact comparison against the (trimmed) expected value.
    Exact(Value),
    /// Numeric band comparison; the original expression text is kept for
    /// later evaluation against the field's actual value.
    Tolerance(String),
}

impl ExpectationRule {
    /// The value to show on the expected side of a mismatch.
    pub fn expected_value(&self) -> Value {
        match self {
            ExpectationRule::Ignore => Value::Null,
            ExpectationRule::MustBeEmpty => Value::String(MUST_BE_EMPTY_SENTINEL.to_string()),
            ExpectationRule::Exact(value) => value.clone(),
            ExpectationRule::Tolerance(text) => Value::String(text.clone()),
        }
    }
}

/// Classify one raw expected cell value.
pub fn parse_expectation_rule(expected_value: &Value) -> ExpectationRule {
    match expected_value {
        Value::Null => ExpectationRule::Ignore,
        Value::String(text) => {
            let stripped = text.trim();
            if stripped.is_empty() {
                return ExpectationRule::Ignore;
            }
            if stripped == MUST_BE_EMPTY_SENTINEL {
                return ExpectationRule::MustBeEmpty;
            }
            if is_tolerance_expression(stripped) {
                return ExpectationRule::Tolerance(stripped.to_string());
            }
            ExpectationRule::Exact(Value::String(stripped.to_string()))
        }
        other => ExpectationRule::Exact(other.clone()),
    }
}
