//! Run execution
//!
//! One run: load artifacts, open the observation window, dispatch every
//! enabled case while the window is already collecting, join both, then match
//! and write the report. The consumption task starts before dispatch because
//! events can legitimately arrive while later sends are still in flight.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::cases::{load_cases, to_expected_events, TestCase};
use crate::config::{load_config, Config};
use crate::consume::{ObservedEventReader, ObservedMessage, StreamTransport};
use crate::dispatch::{Dispatcher, MailTransport, SendResult, SendStatus, SmtpTransport};
use crate::error::{Result, StreamcheckError};
use crate::matching::{match_and_validate, ActualEvent, MatchValidationResult};
use crate::report::{resolve_output_path, write_run_report, RunMetadata};
use crate::schema::{flatten_schema, load_schema_document, FlattenedField, SchemaType};

/// Input contract for executing one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub config_path: PathBuf,
    pub input_path: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub dry_run: bool,
}

/// Output contract for one completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output_path: PathBuf,
    pub sent_ok: usize,
    pub dry_run: bool,
}

/// Loaded domain artifacts required during run execution.
pub struct RunArtifacts {
    pub config: Config,
    pub fields: Vec<FlattenedField>,
    pub cases: Vec<TestCase>,
}

/// Load and cross-validate configuration, schema and cases.
pub fn load_run_artifacts(request: &RunRequest) -> Result<RunArtifacts> {
    let config = load_config(&request.config_path)?;
    let document = load_schema_document(config.schema.schema_type, &config.schema.text)?;
    let fields = flatten_schema(&document)?;
    let field_paths: Vec<String> = fields.iter().map(|f| f.path.clone()).collect();
    let cases = load_cases(&request.input_path, &field_paths)?;
    Ok(RunArtifacts {
        config,
        fields,
        cases,
    })
}

/// Execute one full validation run with the default transports.
pub async fn execute_run(request: &RunRequest) -> Result<RunOutcome> {
    let artifacts = load_run_artifacts(request)?;
    if request.dry_run {
        return execute_dry_run(request, &artifacts);
    }
    if artifacts.config.schema.schema_type != SchemaType::Avsc {
        return Err(StreamcheckError::run(
            "run mode requires an avsc schema for stream decoding",
        ));
    }
    let mail_transport: Arc<dyn MailTransport> =
        Arc::new(SmtpTransport::new(artifacts.config.smtp.clone()));
    let stream_transport = default_stream_transport(&artifacts)?;
    execute_live_run(request, artifacts, mail_transport, stream_transport).await
}

#[cfg(feature = "kafka")]
fn default_stream_transport(artifacts: &RunArtifacts) -> Result<Box<dyn StreamTransport>> {
    Ok(Box::new(crate::consume::KafkaTransport::new(
        &artifacts.config.kafka,
    )?))
}

#[cfg(not(feature = "kafka"))]
fn default_stream_transport(_artifacts: &RunArtifacts) -> Result<Box<dyn StreamTransport>> {
    Err(StreamcheckError::run(
        "this build has no Kafka transport; rebuild with `--features kafka` or use --dry-run",
    ))
}

/// Execute a live run over explicit transports. Exposed so tests and embedders
/// can substitute scripted transports.
pub async fn execute_live_run(
    request: &RunRequest,
    artifacts: RunArtifacts,
    mail_transport: Arc<dyn MailTransport>,
    stream_transport: Box<dyn StreamTransport>,
) -> Result<RunOutcome> {
    let run_start = Utc::now();
    let reader = ObservedEventReader::new(
        stream_transport,
        artifacts.config.kafka.clone(),
        artifacts.fields.clone(),
        &artifacts.config.schema.text,
    )?;

    // Observation window opens at run start, overlapping with dispatch.
    let consume_task = tokio::spawn(reader.consume_from(run_start));

    let dispatcher = Dispatcher::new(
        mail_transport,
        artifacts.config.mail.clone(),
        artifacts.config.smtp.parallelism,
    );
    let send_results = dispatcher.send_all(&artifacts.cases).await;

    let observed = consume_task
        .await
        .map_err(|e| StreamcheckError::run(format!("consumption task aborted: {e}")))??;

    let send_status_by_test_id: BTreeMap<String, SendStatus> = send_results
        .iter()
        .map(|r| (r.test_id.clone(), r.status))
        .collect();
    let sent_ok = send_results
        .iter()
        .filter(|r| r.status == SendStatus::Sent)
        .count();
    info!(sent_ok, observed = observed.len(), "dispatch and consumption joined");

    let match_result = evaluate(&artifacts, &send_results, &observed);

    let output_path = resolve_output_path(
        &request.input_path,
        request.output_dir.as_deref(),
        run_start,
    );
    let metadata = RunMetadata {
        run_start,
        input_path: request.input_path.clone(),
        output_path: output_path.clone(),
        kafka_topic: artifacts.config.kafka.topic.clone(),
        timeout_seconds: artifacts.config.kafka.timeout_seconds,
        sent_ok,
        dry_run: false,
    };
    write_run_report(&metadata, &send_status_by_test_id, &match_result)?;

    Ok(RunOutcome {
        output_path,
        sent_ok,
        dry_run: false,
    })
}

/// Only cases that actually went out can be expected on the stream.
fn evaluate(
    artifacts: &RunArtifacts,
    send_results: &[SendResult],
    observed: &[ObservedMessage],
) -> MatchValidationResult {
    let sent_ids: std::collections::HashSet<&str> = send_results
        .iter()
        .filter(|r| r.status == SendStatus::Sent)
        .map(|r| r.test_id.as_str())
        .collect();
    let sent_cases: Vec<TestCase> = artifacts
        .cases
        .iter()
        .filter(|c| sent_ids.contains(c.test_id.trim()))
        .cloned()
        .collect();
    let expected_events = to_expected_events(&sent_cases);
    let actual_events: Vec<ActualEvent> = observed
        .iter()
        .map(|message| ActualEvent {
            flattened: message.flattened.clone(),
        })
        .collect();
    match_and_validate(
        &expected_events,
        &actual_events,
        &artifacts.config.matching,
        &artifacts.fields,
    )
}

/// Dry run: no SMTP, no stream. Enabled cases report as skipped and every
/// enabled id lands in the unmatched-expected bucket.
fn execute_dry_run(request: &RunRequest, artifacts: &RunArtifacts) -> Result<RunOutcome> {
    let run_start = Utc::now();
    let send_status_by_test_id: BTreeMap<String, SendStatus> = artifacts
        .cases
        .iter()
        .filter(|c| c.enabled)
        .map(|c| (c.test_id.trim().to_string(), SendStatus::Skipped))
        .collect();

    let expected_events = to_expected_events(&artifacts.cases);
    let match_result = MatchValidationResult {
        matches: vec![],
        conflicts: vec![],
        unmatched_actual_events: vec![],
        unmatched_expected_event_ids: expected_events
            .iter()
            .filter(|e| e.enabled)
            .map(|e| e.expected_event_id.clone())
            .collect(),
    };

    let output_path = resolve_output_path(
        &request.input_path,
        request.output_dir.as_deref(),
        run_start,
    );
    let metadata = RunMetadata {
        run_start,
        input_path: request.input_path.clone(),
        output_path: output_path.clone(),
        kafka_topic: artifacts.config.kafka.topic.clone(),
        timeout_seconds: artifacts.config.kafka.timeout_seconds,
        sent_ok: 0,
        dry_run: true,
    };
    write_run_report(&metadata, &send_status_by_test_id, &match_result)?;

    Ok(RunOutcome {
        output_path,
        sent_ok: 0,
        dry_run: true,
    })
}
