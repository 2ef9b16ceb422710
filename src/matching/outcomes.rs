//! Matching and validation domain entities

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Expected event derived from one enabled test case.
///
/// One expected event may legitimately be observed more than once (retries,
/// fan-out); repeated observation is not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedEvent {
    pub expected_event_id: String,
    pub enabled: bool,
    pub sender: String,
    pub subject: String,
    pub expected_values: BTreeMap<String, Value>,
}

/// Actual event derived from one decoded stream message. Consumed exactly
/// once by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActualEvent {
    pub flattened: BTreeMap<String, Value>,
}

/// Difference between expected and actual value for one schema field. Both
/// sides carry the normalized display form, never the raw value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMismatch {
    pub field: String,
    pub expected: String,
    pub actual: String,
}

/// One actual event evaluated against one expected event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedMatch {
    pub expected_event: ExpectedEvent,
    pub actual_event: ActualEvent,
    pub mismatches: Vec<FieldMismatch>,
}

impl ValidatedMatch {
    /// An empty mismatch list means the match passed.
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Actual event whose sender matched several expected events and whose
/// subject did not single one out. Never an error; a first-class result
/// bucket requiring operator attention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchingConflict {
    pub actual_event: ActualEvent,
    pub candidate_expected_event_ids: Vec<String>,
}

/// Outcome of matching and validation over a batch of actual events.
///
/// Every actual event lands in exactly one of `matches`, `conflicts`,
/// `unmatched_actual_events`; every enabled expected id appears in
/// `unmatched_expected_event_ids` iff it was never selected for a match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchValidationResult {
    pub matches: Vec<ValidatedMatch>,
    pub conflicts: Vec<MatchingConflict>,
    pub unmatched_actual_events: Vec<ActualEvent>,
    pub unmatched_expected_event_ids: Vec<String>,
}
