//! Stream consumption
//!
//! A time-windowed polling loop over an abstract stream transport. Each
//! retained message is decoded with the run's Avro decoder and flattened over
//! the configured field paths before it is handed to matching.
//!
//! The loop's only cancellation mechanism is the deadline; there is no
//! external cancel signal. The transport handle is released on every exit
//! path, including errors.

#[cfg(feature = "kafka")]
mod kafka;

#[cfg(feature = "kafka")]
pub use kafka::KafkaTransport;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::KafkaConfig;
use crate::error::Result;
use crate::schema::avro::{AvroDecoder, DecodeError};
use crate::schema::FlattenedField;

/// Transport-level consumption errors. Non-EOF poll errors are fatal to the
/// consumption loop and are never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to create consumer: {0}")]
    Connect(String),

    #[error("failed to subscribe to {topic}: {detail}")]
    Subscribe { topic: String, detail: String },

    #[error("poll failed: {0}")]
    Poll(String),
}

/// One raw record handed back by the transport.
#[derive(Debug, Clone)]
pub struct PolledRecord {
    pub key: Option<Bytes>,
    pub payload: Option<Bytes>,
    /// Transport timestamp in epoch milliseconds, when the broker provides one.
    pub timestamp_ms: Option<i64>,
}

/// Outcome of one poll interval.
#[derive(Debug, Clone)]
pub enum Polled {
    Record(PolledRecord),
    /// End of a partition; not a terminating condition.
    PartitionEof,
    /// Nothing available this interval.
    Idle,
}

/// The stream transport seam. Production runs use the Kafka implementation
/// (feature `kafka`); tests drive the loop with scripted transports.
#[async_trait]
pub trait StreamTransport: Send {
    async fn subscribe(&mut self, topic: &str) -> std::result::Result<(), TransportError>;

    async fn poll(&mut self, timeout: Duration) -> std::result::Result<Polled, TransportError>;

    async fn close(&mut self);
}

/// Decoded stream message ready for matching.
#[derive(Debug, Clone)]
pub struct ObservedMessage {
    pub key: Option<String>,
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    pub flattened: BTreeMap<String, Value>,
}

/// Consumes stream messages from a topic and yields flattened payloads.
pub struct ObservedEventReader {
    transport: Box<dyn StreamTransport>,
    decoder: AvroDecoder,
    schema_fields: Vec<FlattenedField>,
    settings: KafkaConfig,
}

impl ObservedEventReader {
    pub fn new(
        transport: Box<dyn StreamTransport>,
        settings: KafkaConfig,
        schema_fields: Vec<FlattenedField>,
        schema_text: &str,
    ) -> Result<Self> {
        let decoder = AvroDecoder::from_schema_text(schema_text)?;
        Ok(Self {
            transport,
            decoder,
            schema_fields,
            settings,
        })
    }

    /// Poll until `start_time + timeout`, returning every message whose
    /// transport timestamp falls inside the observation window, in arrival
    /// order. The first decode failure or non-EOF transport error aborts the
    /// loop; the window ends early with that error.
    pub async fn consume_from(mut self, start_time: DateTime<Utc>) -> Result<Vec<ObservedMessage>> {
        let outcome = self.run_window(start_time).await;
        self.transport.close().await;
        outcome
    }

    async fn run_window(&mut self, start_time: DateTime<Utc>) -> Result<Vec<ObservedMessage>> {
        let topic = self.settings.topic.clone();
        self.transport.subscribe(&topic).await?;

        let deadline = start_time + chrono::Duration::seconds(self.settings.timeout_seconds as i64);
        let poll_interval = Duration::from_millis(self.settings.poll_interval_ms);
        let mut messages = Vec::new();

        info!(topic = %topic, until = %deadline, "observation window open");
        while Utc::now() < deadline {
            let record = match self.transport.poll(poll_interval).await? {
                Polled::Idle => continue,
                Polled::PartitionEof => {
                    debug!("partition end reached, continuing to poll");
                    continue;
                }
                Polled::Record(record) => record,
            };

            let Some(timestamp_ms) = record.timestamp_ms else {
                debug!("skipping message without transport timestamp");
                continue;
            };
            let Some(message_time) = Utc.timestamp_millis_opt(timestamp_ms).single() else {
                debug!(timestamp_ms, "skipping message with unrepresentable timestamp");
                continue;
            };
            if message_time < start_time {
                debug!(%message_time, "skipping message from before the window");
                continue;
            }

            let payload = record.payload.as_deref().ok_or(DecodeError::EmptyPayload)?;
            let value = self.decoder.decode(payload)?;
            let flattened = flatten_payload(&value, &self.schema_fields)?;
            messages.push(ObservedMessage {
                key: record
                    .key
                    .as_deref()
                    .and_then(|k| std::str::from_utf8(k).ok().map(str::to_string)),
                value,
                timestamp: message_time,
                flattened,
            });
        }
        info!(count = messages.len(), "observation window closed");
        Ok(messages)
    }
}

/// Look up every configured field path in a decoded record. A path whose
/// intermediate segments are missing or non-objects is a decode error; a
/// missing leaf key reads as null.
fn flatten_payload(
    payload: &Value,
    schema_fields: &[FlattenedField],
) -> std::result::Result<BTreeMap<String, Value>, DecodeError> {
    let mut flattened = BTreeMap::new();
    let null = Value::Null;
    for field in schema_fields {
        let mut value = payload;
        for part in field.path.split('.') {
            match value {
                Value::Object(map) => value = map.get(part).unwrap_or(&null),
                _ => return Err(DecodeError::MissingField(field.path.clone())),
            }
        }
        flattened.insert(field.path.clone(), value.clone());
    }
    Ok(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(paths: &[&str]) -> Vec<FlattenedField> {
        paths
            .iter()
            .map(|p| FlattenedField {
                path: p.to_string(),
                definition: json!("string"),
            })
            .collect()
    }

    #[test]
    fn flattens_nested_paths() {
        let payload = json!({"a": {"b": 1}, "c": "x"});
        let flattened = flatten_payload(&payload, &fields(&["a.b", "c"])).unwrap();
        assert_eq!(flattened["a.b"], 1);
        assert_eq!(flattened["c"], "x");
    }

    #[test]
    fn missing_leaf_reads_as_null() {
        let payload = json!({"a": {}});
        let flattened = flatten_payload(&payload, &fields(&["a.b"])).unwrap();
        assert_eq!(flattened["a.b"], Value::Null);
    }

    #[test]
    fn missing_intermediate_segment_is_an_error() {
        let payload = json!({"a": "scalar"});
        assert!(matches!(
            flatten_payload(&payload, &fields(&["a.b"])),
            Err(DecodeError::MissingField(p)) if p == "a.b"
        ));
    }
}
