//! Test-case source
//!
//! Test cases arrive as a JSON array of case objects. The loader normalizes
//! and validates them against the flattened schema paths before anything is
//! dispatched, so a malformed case file fails the run up front.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

use crate::matching::ExpectedEvent;

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("static pattern")
});

/// Case-file loading and validation errors. Fatal to the run.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("case file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {detail}")]
    Io { path: PathBuf, detail: String },

    #[error("failed to parse case file: {0}")]
    Parse(String),

    #[error("case {index}: {detail}")]
    InvalidCase { index: usize, detail: String },

    #[error("case file does not contain any test cases")]
    Empty,
}

/// Normalized representation of one authored test case.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestCase {
    pub test_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub notes: String,
    pub from_address: String,
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub expected_values: BTreeMap<String, Value>,
}

fn default_enabled() -> bool {
    true
}

/// Read and validate a case file against the configured schema paths.
pub fn load_cases(
    case_path: impl AsRef<Path>,
    schema_paths: &[String],
) -> Result<Vec<TestCase>, CaseError> {
    let path = case_path.as_ref();
    if !path.exists() {
        return Err(CaseError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| CaseError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let cases: Vec<TestCase> =
        serde_json::from_str(&text).map_err(|e| CaseError::Parse(e.to_string()))?;
    validate_cases(&cases, schema_paths)?;
    Ok(cases)
}

fn validate_cases(cases: &[TestCase], schema_paths: &[String]) -> Result<(), CaseError> {
    if cases.is_empty() {
        return Err(CaseError::Empty);
    }
    let known_paths: HashSet<&str> = schema_paths.iter().map(String::as_str).collect();
    let mut seen_ids = HashSet::new();
    let mut seen_pairs: HashMap<(String, String), usize> = HashMap::new();

    for (index, case) in cases.iter().enumerate() {
        let invalid = |detail: String| CaseError::InvalidCase { index, detail };

        let test_id = case.test_id.trim();
        if test_id.is_empty() {
            return Err(invalid("test_id is required".to_string()));
        }
        if !seen_ids.insert(test_id.to_string()) {
            return Err(invalid(format!("duplicate test_id '{test_id}'")));
        }
        if !EMAIL_REGEX.is_match(case.from_address.trim()) {
            return Err(invalid(format!(
                "invalid from_address '{}'",
                case.from_address
            )));
        }
        if case.subject.trim().is_empty() {
            return Err(invalid("subject is required".to_string()));
        }
        if case.enabled {
            let pair = (
                case.from_address.trim().to_lowercase(),
                case.subject.trim().to_string(),
            );
            if let Some(previous) = seen_pairs.insert(pair, index) {
                return Err(invalid(format!(
                    "duplicate from/subject combination with case {previous}"
                )));
            }
        }
        for field in case.expected_values.keys() {
            if !known_paths.contains(field.as_str()) {
                return Err(invalid(format!(
                    "expected value references unknown schema field '{field}'"
                )));
            }
        }
    }
    Ok(())
}

/// Convert test cases into expected matching events.
pub fn to_expected_events(cases: &[TestCase]) -> Vec<ExpectedEvent> {
    cases
        .iter()
        .map(|case| ExpectedEvent {
            expected_event_id: case.test_id.trim().to_string(),
            enabled: case.enabled,
            sender: case.from_address.clone(),
            subject: case.subject.clone(),
            expected_values: case.expected_values.clone(),
        })
        .collect()
}
