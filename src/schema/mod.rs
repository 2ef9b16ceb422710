//! Event schema handling
//!
//! Two schema dialects describe the events observed on the stream: Avro
//! (`avsc`) and JSON Schema (`json_schema`). Both are projected onto the same
//! flattened field-path list, which the rest of the system treats as the
//! single source of truth for addressing event values.

pub mod avro;
mod flatten;

pub use flatten::flatten_schema;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Schema parsing and flattening errors. Fatal to the run; raised before any
/// dispatch or consumption begins.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid {dialect} schema: {detail}")]
    InvalidDocument { dialect: SchemaType, detail: String },

    #[error("JSON schema nodes must be objects")]
    NonObjectNode,

    #[error("JSON schema root must define object properties")]
    RootWithoutProperties,

    #[error("Avro root must be a record with named fields")]
    RootNotRecord,

    #[error("Avro record requires a fields array")]
    RecordWithoutFields,

    #[error("field definitions must include a name")]
    NamelessField,

    #[error("unsupported schema segment: {0}")]
    UnsupportedSegment(String),

    #[error("duplicate flattened field detected: {0}")]
    DuplicatePath(String),
}

/// Supported schema dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    /// Apache Avro schema (`.avsc` JSON)
    Avsc,
    /// JSON Schema
    JsonSchema,
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaType::Avsc => write!(f, "avsc"),
            SchemaType::JsonSchema => write!(f, "json_schema"),
        }
    }
}

impl std::str::FromStr for SchemaType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avsc" => Ok(SchemaType::Avsc),
            "json_schema" => Ok(SchemaType::JsonSchema),
            other => Err(SchemaError::UnsupportedSegment(other.to_string())),
        }
    }
}

/// Structured representation of a schema definition
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    pub schema_type: SchemaType,
    pub root: Value,
}

/// One flattened schema field: a dot-joined path plus the raw (dialect-native)
/// type descriptor it resolved to. Produced once per run and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlattenedField {
    pub path: String,
    pub definition: Value,
}

/// Parse schema text into a structured document.
pub fn load_schema_document(
    schema_type: SchemaType,
    text: &str,
) -> Result<SchemaDocument, SchemaError> {
    let root: Value =
        serde_json::from_str(text).map_err(|e| SchemaError::InvalidDocument {
            dialect: schema_type,
            detail: e.to_string(),
        })?;
    Ok(SchemaDocument { schema_type, root })
}
