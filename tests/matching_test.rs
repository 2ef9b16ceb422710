//! Matching engine integration tests
//!
//! Covers the outcome-bucket invariants: every actual event lands in exactly
//! one of matches/conflicts/unmatched, every enabled expected id is either
//! matched at least once, unmatched, or named by a conflict.

use serde_json::{json, Value};
use streamcheck::config::MatchingConfig;
use streamcheck::matching::{match_and_validate, ActualEvent, ExpectedEvent};
use streamcheck::schema::FlattenedField;

fn config() -> MatchingConfig {
    MatchingConfig {
        from_field: "sender".to_string(),
        subject_field: "subject".to_string(),
    }
}

fn fields() -> Vec<FlattenedField> {
    vec![
        FlattenedField {
            path: "sender".into(),
            definition: json!("string"),
        },
        FlattenedField {
            path: "subject".into(),
            definition: json!("string"),
        },
        FlattenedField {
            path: "score".into(),
            definition: json!("double"),
        },
    ]
}

fn expected(id: &str, sender: &str, subject: &str, values: &[(&str, Value)]) -> ExpectedEvent {
    ExpectedEvent {
        expected_event_id: id.to_string(),
        enabled: true,
        sender: sender.to_string(),
        subject: subject.to_string(),
        expected_values: values
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    }
}

fn actual(sender: &str, subject: &str, score: Value) -> ActualEvent {
    ActualEvent {
        flattened: [
            ("sender".to_string(), json!(sender)),
            ("subject".to_string(), json!(subject)),
            ("score".to_string(), score),
        ]
        .into_iter()
        .collect(),
    }
}

#[test]
fn tolerance_boundary_behavior() {
    let exp = [expected(
        "tc-1",
        "a@example.org",
        "S",
        &[("score", json!("3,14+-0,2"))],
    )];

    let inside = [actual("a@example.org", "S", json!(3.30))];
    let result = match_and_validate(&exp, &inside, &config(), &fields());
    assert!(result.matches[0].is_ok(), "3.30 is inside the band");

    let outside = [actual("a@example.org", "S", json!(3.50))];
    let result = match_and_validate(&exp, &outside, &config(), &fields());
    assert_eq!(result.matches[0].mismatches.len(), 1);
    assert_eq!(result.matches[0].mismatches[0].field, "score");
}

#[test]
fn sender_collision_disambiguated_by_subject() {
    let exp = [
        expected("tc-a", "a@example.org", "Subject A", &[]),
        expected("tc-b", "a@example.org", "Subject B", &[]),
    ];
    let act = [actual("a@example.org", "Subject B", json!(null))];
    let result = match_and_validate(&exp, &act, &config(), &fields());

    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].expected_event.expected_event_id, "tc-b");
    assert!(result.conflicts.is_empty());
    assert_eq!(result.unmatched_expected_event_ids, ["tc-a"]);
}

#[test]
fn true_ambiguity_records_conflict_with_all_candidates() {
    let exp = [
        expected("tc-a", "a@example.org", "Subject A", &[]),
        expected("tc-b", "a@example.org", "Subject B", &[]),
    ];
    let act = [actual("a@example.org", "Subject Z", json!(null))];
    let result = match_and_validate(&exp, &act, &config(), &fields());

    assert!(result.matches.is_empty());
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(
        result.conflicts[0].candidate_expected_event_ids,
        ["tc-a", "tc-b"]
    );
    // Both remain unmatched; reconciling the double-listing is a rendering
    // concern, not an engine concern.
    assert_eq!(result.unmatched_expected_event_ids, ["tc-a", "tc-b"]);
    assert!(result.unmatched_actual_events.is_empty());
}

#[test]
fn every_actual_event_lands_in_exactly_one_bucket() {
    let exp = [
        expected("tc-a", "a@example.org", "Subject A", &[]),
        expected("tc-b", "a@example.org", "Subject B", &[]),
        expected("tc-c", "c@example.org", "Subject C", &[]),
    ];
    let act = [
        actual("a@example.org", "Subject A", json!(null)), // match
        actual("a@example.org", "Subject Z", json!(null)), // conflict
        actual("nobody@example.org", "Subject A", json!(null)), // unmatched
    ];
    let result = match_and_validate(&exp, &act, &config(), &fields());

    let total =
        result.matches.len() + result.conflicts.len() + result.unmatched_actual_events.len();
    assert_eq!(total, act.len());
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.unmatched_actual_events.len(), 1);
    assert_eq!(result.unmatched_expected_event_ids, ["tc-b", "tc-c"]);
}

#[test]
fn every_enabled_id_is_matched_unmatched_or_conflicted() {
    let exp = [
        expected("tc-a", "a@example.org", "Subject A", &[]),
        expected("tc-b", "b@example.org", "Subject B", &[]),
    ];
    let act = [actual("a@example.org", "Subject A", json!(null))];
    let result = match_and_validate(&exp, &act, &config(), &fields());

    for event in &exp {
        let id = &event.expected_event_id;
        let matched = result
            .matches
            .iter()
            .any(|m| &m.expected_event.expected_event_id == id);
        let unmatched = result.unmatched_expected_event_ids.contains(id);
        let conflicted = result
            .conflicts
            .iter()
            .any(|c| c.candidate_expected_event_ids.contains(id));
        assert!(
            matched ^ unmatched || conflicted,
            "{id} must land in exactly one expected bucket"
        );
    }
}

#[test]
fn results_are_byte_identical_across_reruns() {
    let exp = [
        expected("tc-a", "a@example.org", "Subject A", &[("score", json!("1+-1"))]),
        expected("tc-b", "a@example.org", "Subject B", &[]),
    ];
    let act = [
        actual("a@example.org", "Subject A", json!(0.5)),
        actual("a@example.org", "Subject Q", json!(null)),
        actual("x@example.org", "Subject A", json!(null)),
    ];
    let first = match_and_validate(&exp, &act, &config(), &fields());
    let second = match_and_validate(&exp, &act, &config(), &fields());
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}
