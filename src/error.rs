//! Error types for streamcheck
//!
//! Each subsystem defines its own domain error next to its models; this
//! module aggregates them into the crate-level error and provides the
//! `Result` alias used throughout.

use thiserror::Error;

use crate::cases::CaseError;
use crate::config::ConfigError;
use crate::consume::TransportError;
use crate::dispatch::DispatchError;
use crate::schema::avro::DecodeError;
use crate::schema::SchemaError;

/// Result type alias for streamcheck operations
pub type Result<T> = std::result::Result<T, StreamcheckError>;

/// Main error type for streamcheck
#[derive(Error, Debug)]
pub enum StreamcheckError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Test case error: {0}")]
    Case(#[from] CaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Run error: {0}")]
    Run(String),
}

impl StreamcheckError {
    /// Construct a run-level error from any displayable cause.
    pub fn run(message: impl Into<String>) -> Self {
        Self::Run(message.into())
    }
}
