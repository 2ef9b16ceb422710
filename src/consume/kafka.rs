//! Kafka transport backed by librdkafka
//!
//! Only compiled with the `kafka` feature. Polling happens on the blocking
//! pool; partition-EOF errors surface as [`Polled::PartitionEof`] so the
//! consumption loop can skip them.

use bytes::Bytes;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{KafkaConfig, DEFAULT_GROUP_ID};

use super::{Polled, PolledRecord, StreamTransport, TransportError};

/// Stream transport over an rdkafka `BaseConsumer`.
pub struct KafkaTransport {
    consumer: Option<Arc<BaseConsumer>>,
}

impl KafkaTransport {
    /// Build a consumer from the run configuration. Auto-commit is disabled;
    /// the run never commits offsets.
    pub fn new(settings: &KafkaConfig) -> Result<Self, TransportError> {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", settings.bootstrap_servers.join(","))
            .set(
                "group.id",
                settings.group_id.as_deref().unwrap_or(DEFAULT_GROUP_ID),
            )
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", &settings.auto_offset_reset);
        for (key, value) in &settings.security {
            config.set(key, value);
        }
        let consumer: BaseConsumer = config
            .create()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            consumer: Some(Arc::new(consumer)),
        })
    }

    fn consumer(&self) -> Result<&Arc<BaseConsumer>, TransportError> {
        self.consumer
            .as_ref()
            .ok_or_else(|| TransportError::Poll("consumer already closed".to_string()))
    }
}

#[async_trait]
impl StreamTransport for KafkaTransport {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.consumer()?
            .subscribe(&[topic])
            .map_err(|e| TransportError::Subscribe {
                topic: topic.to_string(),
                detail: e.to_string(),
            })
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Polled, TransportError> {
        let consumer = Arc::clone(self.consumer()?);
        let polled = tokio::task::spawn_blocking(move || {
            consumer.poll(timeout).map(|result| result.map(|m| m.detach()))
        })
        .await
        .map_err(|e| TransportError::Poll(e.to_string()))?;

        match polled {
            None => Ok(Polled::Idle),
            Some(Err(KafkaError::PartitionEOF(_))) => Ok(Polled::PartitionEof),
            Some(Err(e)) => Err(TransportError::Poll(e.to_string())),
            Some(Ok(message)) => Ok(Polled::Record(PolledRecord {
                key: message.key().map(Bytes::copy_from_slice),
                payload: message.payload().map(Bytes::copy_from_slice),
                timestamp_ms: message.timestamp().to_millis(),
            })),
        }
    }

    async fn close(&mut self) {
        // Dropping the consumer leaves the group and releases the handle.
        self.consumer.take();
    }
}
