//! Run report writing
//!
//! Serializes one run's full outcome — metadata, per-case send status and the
//! complete match validation result — as a pretty-printed JSON document next
//! to the input file (or into the configured output directory).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::dispatch::SendStatus;
use crate::error::Result;
use crate::matching::MatchValidationResult;

/// Metadata describing one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub run_start: DateTime<Utc>,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub kafka_topic: String,
    pub timeout_seconds: u64,
    pub sent_ok: usize,
    pub dry_run: bool,
}

/// Top-level report document.
#[derive(Debug, Serialize)]
struct RunReport<'a> {
    metadata: &'a RunMetadata,
    send_status_by_test_id: &'a BTreeMap<String, SendStatus>,
    result: &'a MatchValidationResult,
}

/// Resolve the output path for a run: `{input_stem}-results-{timestamp}.json`
/// in the output directory, defaulting to the input's parent.
pub fn resolve_output_path(
    input_path: &Path,
    output_dir: Option<&Path>,
    run_start: DateTime<Utc>,
) -> PathBuf {
    let destination = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input_path.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let stem = input_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("run");
    let timestamp = run_start.format("%Y%m%d-%H%M%S");
    destination.join(format!("{stem}-results-{timestamp}.json"))
}

/// Write the report document and return its path.
pub fn write_run_report(
    metadata: &RunMetadata,
    send_status_by_test_id: &BTreeMap<String, SendStatus>,
    result: &MatchValidationResult,
) -> Result<PathBuf> {
    let report = RunReport {
        metadata,
        send_status_by_test_id,
        result,
    };
    let rendered = serde_json::to_string_pretty(&report)?;
    std::fs::write(&metadata.output_path, rendered)?;
    info!(path = %metadata.output_path.display(), "run report written");
    Ok(metadata.output_path.clone())
}
