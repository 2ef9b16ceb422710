//! Matching and expected-vs-actual validation
//!
//! Correlates actual events observed on the stream with the expected events
//! derived from enabled test cases, then validates every asserted field value.
//! The whole evaluation is one single-threaded pass; concurrency ends before
//! matching begins.

mod evaluator;
mod numeric;
mod outcomes;
mod rules;

pub use evaluator::match_and_validate;
pub use numeric::{normalize_comparison_value, parse_decimal};
pub use outcomes::{
    ActualEvent, ExpectedEvent, FieldMismatch, MatchValidationResult, MatchingConflict,
    ValidatedMatch,
};
pub use rules::{parse_expectation_rule, ExpectationRule};
