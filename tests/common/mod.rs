//! Shared test fixtures and utilities for streamcheck integration tests
//!
//! In your test file, add:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```
//!
//! Provides Avro binary encoding helpers, scripted stream/mail transports,
//! and builders for temporary config and case files.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use streamcheck::consume::{Polled, PolledRecord, StreamTransport, TransportError};
use streamcheck::dispatch::{DispatchError, MailMessage, MailTransport};

// ============================================================================
// Avro binary encoding helpers
// ============================================================================

/// Zigzag-encode a long the way Avro writes it.
pub fn avro_long(value: i64) -> Vec<u8> {
    let mut raw = ((value << 1) ^ (value >> 63)) as u64;
    let mut out = Vec::new();
    loop {
        let byte = (raw & 0x7F) as u8;
        raw >>= 7;
        if raw == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

/// Length-prefixed UTF-8 string.
pub fn avro_str(value: &str) -> Vec<u8> {
    let mut out = avro_long(value.len() as i64);
    out.extend_from_slice(value.as_bytes());
    out
}

/// Little-endian Avro double.
pub fn avro_double(value: f64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}

/// Prefix a payload with the Confluent wire-format header.
pub fn confluent_framed(payload: &[u8], schema_id: u32) -> Vec<u8> {
    let mut framed = vec![0u8];
    framed.extend_from_slice(&schema_id.to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}

// ============================================================================
// Event schema fixtures
// ============================================================================

/// Avro schema used across the integration tests: sender/subject plus one
/// float field, one integer field and a nested payload record.
pub const EVENT_AVSC: &str = r#"{
    "type": "record",
    "name": "MailEvent",
    "fields": [
        {"name": "sender", "type": "string"},
        {"name": "subject", "type": "string"},
        {"name": "score", "type": "double"},
        {"name": "attempts", "type": "long"},
        {"name": "payload", "type": {
            "type": "record",
            "name": "Payload",
            "fields": [{"name": "note", "type": ["null", "string"]}]
        }}
    ]
}"#;

/// Encode one MailEvent record (note encoded as union branch 1 when present).
pub fn encode_event(sender: &str, subject: &str, score: f64, attempts: i64, note: Option<&str>) -> Vec<u8> {
    let mut payload = avro_str(sender);
    payload.extend(avro_str(subject));
    payload.extend(avro_double(score));
    payload.extend(avro_long(attempts));
    match note {
        None => payload.extend(avro_long(0)),
        Some(text) => {
            payload.extend(avro_long(1));
            payload.extend(avro_str(text));
        }
    }
    payload
}

// ============================================================================
// Scripted stream transport
// ============================================================================

/// One scripted poll outcome.
pub enum ScriptStep {
    Yield(Polled),
    Fail(String),
}

/// Stream transport that replays a fixed script, then idles until the
/// consumption deadline. Records subscribe/close calls for assertions.
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<ScriptStep>>,
    pub subscribed_topic: Arc<Mutex<Option<String>>>,
    pub closed: Arc<AtomicBool>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            subscribed_topic: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handles to the subscribe/close markers, for assertions after the
    /// transport has been moved into the reader.
    pub fn probes(&self) -> (Arc<Mutex<Option<String>>>, Arc<AtomicBool>) {
        (
            Arc::clone(&self.subscribed_topic),
            Arc::clone(&self.closed),
        )
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        *self.subscribed_topic.lock().unwrap() = Some(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Polled, TransportError> {
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(ScriptStep::Yield(polled)) => Ok(polled),
            Some(ScriptStep::Fail(detail)) => Err(TransportError::Poll(detail)),
            None => {
                tokio::time::sleep(timeout.min(Duration::from_millis(20))).await;
                Ok(Polled::Idle)
            }
        }
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// A record carrying the given payload, stamped inside the observation window.
pub fn record_now(payload: Vec<u8>) -> Polled {
    Polled::Record(PolledRecord {
        key: None,
        payload: Some(Bytes::from(payload)),
        timestamp_ms: Some(chrono::Utc::now().timestamp_millis() + 250),
    })
}

/// A record stamped with an explicit timestamp (milliseconds), or none.
pub fn record_at(payload: Vec<u8>, timestamp_ms: Option<i64>) -> Polled {
    Polled::Record(PolledRecord {
        key: None,
        payload: Some(Bytes::from(payload)),
        timestamp_ms,
    })
}

// ============================================================================
// Scripted mail transport
// ============================================================================

/// Mail transport that records delivered test ids and optionally fails a
/// chosen case.
pub struct RecordingMailTransport {
    pub delivered: Arc<Mutex<Vec<String>>>,
    pub fail_for: Option<String>,
}

impl RecordingMailTransport {
    pub fn new() -> Self {
        Self {
            delivered: Arc::new(Mutex::new(Vec::new())),
            fail_for: None,
        }
    }

    pub fn failing_for(test_id: &str) -> Self {
        Self {
            delivered: Arc::new(Mutex::new(Vec::new())),
            fail_for: Some(test_id.to_string()),
        }
    }
}

#[async_trait]
impl MailTransport for RecordingMailTransport {
    async fn deliver(&self, message: &MailMessage) -> Result<(), DispatchError> {
        if self.fail_for.as_deref() == Some(message.test_id.as_str()) {
            return Err(DispatchError::Smtp {
                command: "DATA".to_string(),
                reply: "550 scripted rejection".to_string(),
            });
        }
        self.delivered.lock().unwrap().push(message.test_id.clone());
        Ok(())
    }
}

// ============================================================================
// Config and case file builders
// ============================================================================

/// Write a config file pointing at the shared event schema, with a short
/// observation window suitable for tests.
pub fn write_test_config(dir: &std::path::Path, timeout_seconds: u64) -> std::path::PathBuf {
    let schema_path = dir.join("event.avsc");
    std::fs::write(&schema_path, EVENT_AVSC).unwrap();
    let config_path = dir.join("streamcheck.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"
[schema]
avsc = {{ path = "event.avsc" }}

[matching]
from_field = "sender"
subject_field = "subject"

[smtp]
host = "127.0.0.1"
port = 2525
parallelism = 2

[mail]
to_address = "inbox@example.org"

[kafka]
bootstrap_servers = ["127.0.0.1:9092"]
topic = "mail-events"
timeout_seconds = {timeout_seconds}
poll_interval_ms = 50
"#
    )
    .unwrap();
    config_path
}

/// Write a case file with the given JSON array text.
pub fn write_case_file(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("cases.json");
    std::fs::write(&path, contents).unwrap();
    path
}
