//! Outbound dispatch
//!
//! Sends one message per enabled test case, concurrently, bounded by the
//! configured parallelism. Each send is failure-isolated: one failing or
//! panicking send never affects the others, and results come back in the
//! original case order regardless of completion order. Nothing is retried.

mod message;
mod smtp;

pub use message::MailMessage;
pub use smtp::SmtpTransport;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::cases::TestCase;
use crate::config::MailConfig;

/// Per-send dispatch errors. Isolated to one test case; recorded as a failed
/// send status, never escalated.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to connect to {address}: {detail}")]
    Connect { address: String, detail: String },

    #[error("SMTP {command} rejected: {reply}")]
    Smtp { command: String, reply: String },

    #[error("send timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The mail transport seam. Production runs use [`SmtpTransport`]; tests
/// drive the pool with scripted transports.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, message: &MailMessage) -> Result<(), DispatchError>;
}

/// Send outcome status for one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendStatus {
    Sent,
    Failed,
    Skipped,
}

/// Outcome of attempting to send one test-case message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendResult {
    pub test_id: String,
    pub status: SendStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl SendResult {
    pub fn sent(test_id: &str) -> Self {
        Self {
            test_id: test_id.to_string(),
            status: SendStatus::Sent,
            sent_at: Some(Utc::now()),
            error_message: None,
        }
    }

    pub fn failed(test_id: &str, error: &str) -> Self {
        Self {
            test_id: test_id.to_string(),
            status: SendStatus::Failed,
            sent_at: None,
            error_message: Some(error.to_string()),
        }
    }

    pub fn skipped(test_id: &str) -> Self {
        Self {
            test_id: test_id.to_string(),
            status: SendStatus::Skipped,
            sent_at: None,
            error_message: None,
        }
    }
}

/// Bounded-parallel dispatcher over a mail transport.
pub struct Dispatcher {
    transport: Arc<dyn MailTransport>,
    mail: MailConfig,
    parallelism: usize,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn MailTransport>, mail: MailConfig, parallelism: usize) -> Self {
        Self {
            transport,
            mail,
            parallelism: parallelism.max(1),
        }
    }

    /// Send every enabled case; disabled cases report as skipped. Results are
    /// in input order.
    pub async fn send_all(&self, cases: &[TestCase]) -> Vec<SendResult> {
        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut handles = Vec::with_capacity(cases.len());

        for case in cases {
            if !case.enabled {
                debug!(test_id = %case.test_id, "skipping disabled case");
                handles.push(None);
                continue;
            }
            let semaphore = Arc::clone(&semaphore);
            let transport = Arc::clone(&self.transport);
            let mail = self.mail.clone();
            let case = case.clone();
            handles.push(Some(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return SendResult::failed(&case.test_id, "dispatch pool closed"),
                };
                let message = MailMessage::compose(&case, &mail);
                match transport.deliver(&message).await {
                    Ok(()) => SendResult::sent(&case.test_id),
                    Err(error) => {
                        warn!(test_id = %case.test_id, %error, "send failed");
                        SendResult::failed(&case.test_id, &error.to_string())
                    }
                }
            })));
        }

        let mut results = Vec::with_capacity(cases.len());
        for (case, handle) in cases.iter().zip(handles) {
            match handle {
                None => results.push(SendResult::skipped(&case.test_id)),
                Some(handle) => match handle.await {
                    Ok(result) => results.push(result),
                    Err(join_error) => {
                        warn!(test_id = %case.test_id, %join_error, "send task aborted");
                        results.push(SendResult::failed(
                            &case.test_id,
                            &format!("send task aborted: {join_error}"),
                        ));
                    }
                },
            }
        }
        results
    }
}
