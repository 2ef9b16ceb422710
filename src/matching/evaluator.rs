//! The matching engine
//!
//! One single-threaded pass over the actual events, in arrival order:
//! sender lookup, subject disambiguation, per-field validation. Shared state
//! lives in a context/state pair owned exclusively by this pass.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::config::MatchingConfig;
use crate::schema::FlattenedField;

use super::numeric::{match_tolerance_expression, normalize_comparison_value, parse_decimal};
use super::outcomes::{
    ActualEvent, ExpectedEvent, FieldMismatch, MatchValidationResult, MatchingConflict,
    ValidatedMatch,
};
use super::rules::{parse_expectation_rule, ExpectationRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Float,
    Integer,
    Other,
}

/// Read-only context needed while processing each actual event.
struct MatchingContext<'a> {
    from_field: &'a str,
    subject_field: &'a str,
    field_kinds: HashMap<String, FieldKind>,
    expected_by_sender: HashMap<String, Vec<&'a ExpectedEvent>>,
}

/// Mutable collector for match processing outcomes.
#[derive(Default)]
struct MatchingState {
    matches: Vec<ValidatedMatch>,
    conflicts: Vec<MatchingConflict>,
    unmatched_actual_events: Vec<ActualEvent>,
    matched_expected_event_ids: HashSet<String>,
}

/// Match actual events to expected events and validate expected field values.
///
/// Disabled expected events are excluded from every result bucket. The result
/// is deterministic for a given input order.
pub fn match_and_validate(
    expected_events: &[ExpectedEvent],
    actual_events: &[ActualEvent],
    matching_config: &MatchingConfig,
    schema_fields: &[FlattenedField],
) -> MatchValidationResult {
    let enabled: Vec<&ExpectedEvent> = expected_events.iter().filter(|e| e.enabled).collect();
    let context = MatchingContext {
        from_field: &matching_config.from_field,
        subject_field: &matching_config.subject_field,
        field_kinds: infer_field_kinds(schema_fields),
        expected_by_sender: group_by_sender(&enabled),
    };
    let mut state = MatchingState::default();

    for actual_event in actual_events {
        process_actual_event(actual_event, &context, &mut state);
    }

    let unmatched_expected_event_ids = enabled
        .iter()
        .filter(|e| !state.matched_expected_event_ids.contains(&e.expected_event_id))
        .map(|e| e.expected_event_id.clone())
        .collect();

    MatchValidationResult {
        matches: state.matches,
        conflicts: state.conflicts,
        unmatched_actual_events: state.unmatched_actual_events,
        unmatched_expected_event_ids,
    }
}

fn process_actual_event(
    actual_event: &ActualEvent,
    context: &MatchingContext<'_>,
    state: &mut MatchingState,
) {
    let sender_key = normalize_sender(field_value(actual_event, context.from_field));
    let Some(candidates) = context.expected_by_sender.get(&sender_key) else {
        debug!(sender = %sender_key, "actual event matched no expected sender");
        state.unmatched_actual_events.push(actual_event.clone());
        return;
    };

    let Some(selected) = select_expected_event(candidates, actual_event, context.subject_field)
    else {
        let candidate_ids: Vec<String> = candidates
            .iter()
            .map(|e| e.expected_event_id.clone())
            .collect();
        debug!(candidates = ?candidate_ids, "subject did not disambiguate sender collision");
        state.conflicts.push(MatchingConflict {
            actual_event: actual_event.clone(),
            candidate_expected_event_ids: candidate_ids,
        });
        return;
    };

    let mismatches = validate_expected_values(
        &selected.expected_values,
        &actual_event.flattened,
        &context.field_kinds,
    );
    state.matches.push(ValidatedMatch {
        expected_event: selected.clone(),
        actual_event: actual_event.clone(),
        mismatches,
    });
    // Idempotent: repeated observations of the same expected event are allowed.
    state
        .matched_expected_event_ids
        .insert(selected.expected_event_id.clone());
}

fn select_expected_event<'a>(
    candidates: &[&'a ExpectedEvent],
    actual_event: &ActualEvent,
    subject_field: &str,
) -> Option<&'a ExpectedEvent> {
    if let [single] = candidates {
        return Some(*single);
    }
    let actual_subject = normalize_subject(field_value(actual_event, subject_field));
    let mut subject_matches = candidates
        .iter()
        .copied()
        .filter(|c| normalize_subject(Some(&Value::String(c.subject.clone()))) == actual_subject);
    match (subject_matches.next(), subject_matches.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

fn group_by_sender<'a>(
    expected_events: &[&'a ExpectedEvent],
) -> HashMap<String, Vec<&'a ExpectedEvent>> {
    let mut grouped: HashMap<String, Vec<&'a ExpectedEvent>> = HashMap::new();
    for event in expected_events {
        let key = normalize_sender(Some(&Value::String(event.sender.clone())));
        grouped.entry(key).or_default().push(event);
    }
    grouped
}

fn validate_expected_values(
    expected_values: &BTreeMap<String, Value>,
    actual_values: &BTreeMap<String, Value>,
    field_kinds: &HashMap<String, FieldKind>,
) -> Vec<FieldMismatch> {
    let mut mismatches = Vec::new();
    let null = Value::Null;
    for (field, expected_value) in expected_values {
        let rule = parse_expectation_rule(expected_value);
        if rule == ExpectationRule::Ignore {
            continue;
        }

        let actual_value = actual_values.get(field).unwrap_or(&null);
        if rule == ExpectationRule::MustBeEmpty {
            if !is_empty_actual(actual_value) {
                mismatches.push(FieldMismatch {
                    field: field.clone(),
                    expected: normalize_comparison_value(&rule.expected_value()),
                    actual: normalize_comparison_value(actual_value),
                });
            }
            continue;
        }

        let kind = field_kinds.get(field).copied().unwrap_or(FieldKind::Other);
        if !values_match(&rule.expected_value(), actual_value, kind) {
            mismatches.push(FieldMismatch {
                field: field.clone(),
                expected: normalize_comparison_value(&rule.expected_value()),
                actual: normalize_comparison_value(actual_value),
            });
        }
    }
    mismatches
}

fn values_match(expected_value: &Value, actual_value: &Value, kind: FieldKind) -> bool {
    if kind == FieldKind::Float {
        if let Some(verdict) = match_tolerance_expression(expected_value, actual_value) {
            return verdict;
        }
        if let (Some(expected), Some(actual)) =
            (parse_decimal(expected_value), parse_decimal(actual_value))
        {
            return expected == actual;
        }
    }

    if kind == FieldKind::Integer {
        if let (Some(expected), Some(actual)) =
            (parse_decimal(expected_value), parse_decimal(actual_value))
        {
            return expected == actual;
        }
    }

    normalize_comparison_value(expected_value) == normalize_comparison_value(actual_value)
}

fn infer_field_kinds(schema_fields: &[FlattenedField]) -> HashMap<String, FieldKind> {
    schema_fields
        .iter()
        .map(|field| (field.path.clone(), infer_field_kind(&field.definition)))
        .collect()
}

fn infer_field_kind(definition: &Value) -> FieldKind {
    let mut type_names = HashSet::new();
    collect_type_names(definition, &mut type_names);
    if ["number", "float", "double"]
        .iter()
        .any(|name| type_names.contains(*name))
    {
        return FieldKind::Float;
    }
    if ["integer", "int", "long"]
        .iter()
        .any(|name| type_names.contains(*name))
    {
        return FieldKind::Integer;
    }
    FieldKind::Other
}

fn collect_type_names(definition: &Value, names: &mut HashSet<String>) {
    match definition {
        Value::String(name) => {
            names.insert(name.clone());
        }
        Value::Object(map) => {
            if let Some(inner) = map.get("type") {
                collect_type_names(inner, names);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_type_names(item, names);
            }
        }
        _ => {}
    }
}

fn is_empty_actual(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn field_value<'a>(actual_event: &'a ActualEvent, path: &str) -> Option<&'a Value> {
    actual_event.flattened.get(path)
}

fn normalize_sender(value: Option<&Value>) -> String {
    value
        .map(normalize_comparison_value)
        .unwrap_or_default()
        .to_lowercase()
}

fn normalize_subject(value: Option<&Value>) -> String {
    value.map(normalize_comparison_value).unwrap_or_default()
}
