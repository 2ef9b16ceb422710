//! Avro binary decoding
//!
//! Decodes raw stream payloads into JSON values using a parsed `.avsc` schema,
//! without a schema-registry client. The schema JSON is resolved into an
//! [`AvroSchema`] sum type once, up front; a pre-pass collects every named
//! type (record/enum/fixed, including those nested inside fields, arrays and
//! maps) into a registry so that by-name references — recursive ones included
//! — resolve during decoding.
//!
//! Payloads in the Confluent wire format (magic byte `0x00` + 4-byte schema
//! id) are accepted by stripping the 5-byte header; the schema id is ignored.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Avro payload decoding errors. Fatal to the message being decoded; the
/// consumption loop treats the first one as ending the observation window.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid avsc schema JSON: {0}")]
    InvalidSchema(String),

    #[error("avsc schema root must be a JSON object")]
    SchemaRootNotObject,

    #[error("avsc node is missing a valid 'type': {0}")]
    InvalidSchemaNode(String),

    #[error("{kind} definition requires {missing}")]
    IncompleteDefinition {
        kind: &'static str,
        missing: &'static str,
    },

    #[error("received empty message payload")]
    EmptyPayload,

    #[error("unexpected end of Avro payload")]
    ShortBuffer,

    #[error("Avro varint is too long")]
    VarintTooLong,

    #[error("negative length in Avro payload")]
    NegativeLength,

    #[error("invalid UTF-8 string in Avro payload")]
    InvalidUtf8,

    #[error("non-finite number in Avro payload")]
    NonFiniteNumber,

    #[error("Avro union index out of range: {0}")]
    UnionIndexOutOfRange(i64),

    #[error("Avro enum index out of range: {0}")]
    EnumIndexOutOfRange(i64),

    #[error("unknown Avro type reference: {0}")]
    UnknownTypeReference(String),

    #[error("Avro payload contains trailing bytes")]
    TrailingBytes,

    #[error("decoded Avro root must be a record object")]
    RootNotRecord,

    #[error("missing schema field {0}")]
    MissingField(String),
}

/// Resolved Avro schema node. Named-type references stay symbolic
/// ([`AvroSchema::Ref`]) and resolve through the decoder's registry.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Record {
        name: String,
        fields: Vec<(String, AvroSchema)>,
    },
    Enum {
        name: String,
        symbols: Vec<String>,
    },
    Array(Box<AvroSchema>),
    Map(Box<AvroSchema>),
    Fixed {
        name: String,
        size: usize,
    },
    Union(Vec<AvroSchema>),
    Ref(String),
}

/// Binary decoder for one parsed schema. Built once per run, reused read-only
/// across all decode calls.
#[derive(Debug, Clone)]
pub struct AvroDecoder {
    root: AvroSchema,
    named_types: HashMap<String, AvroSchema>,
}

impl AvroDecoder {
    /// Parse schema text and build the named-type registry.
    pub fn from_schema_text(text: &str) -> Result<Self, DecodeError> {
        let root: Value =
            serde_json::from_str(text).map_err(|e| DecodeError::InvalidSchema(e.to_string()))?;
        if !root.is_object() {
            return Err(DecodeError::SchemaRootNotObject);
        }
        let mut named_types = HashMap::new();
        let root = parse_schema_node(&root, &mut named_types)?;
        Ok(Self { root, named_types })
    }

    /// Decode a raw payload into a JSON object, consuming the entire buffer.
    pub fn decode(&self, payload: &[u8]) -> Result<Value, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::EmptyPayload);
        }
        // Confluent wire format: magic byte 0 + 4-byte schema id + binary body.
        let body = if payload.len() >= 5 && payload[0] == 0 {
            &payload[5..]
        } else {
            payload
        };
        let mut cursor = Cursor::new(body);
        let decoded = self.decode_node(&self.root, &mut cursor)?;
        if cursor.remaining() > 0 {
            return Err(DecodeError::TrailingBytes);
        }
        if !decoded.is_object() {
            return Err(DecodeError::RootNotRecord);
        }
        Ok(decoded)
    }

    fn decode_node(&self, schema: &AvroSchema, cursor: &mut Cursor<'_>) -> Result<Value, DecodeError> {
        match schema {
            AvroSchema::Null => Ok(Value::Null),
            AvroSchema::Boolean => Ok(Value::Bool(cursor.read_exact(1)?[0] != 0)),
            AvroSchema::Int | AvroSchema::Long => {
                Ok(Value::Number(Number::from(cursor.read_long()?)))
            }
            AvroSchema::Float => {
                let raw = cursor.read_exact(4)?;
                let value = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
                number_from_f64(f64::from(value))
            }
            AvroSchema::Double => {
                let raw = cursor.read_exact(8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(raw);
                number_from_f64(f64::from_le_bytes(buf))
            }
            AvroSchema::Bytes => {
                let raw = cursor.read_length_prefixed()?;
                Ok(Value::String(BASE64.encode(raw)))
            }
            AvroSchema::String => Ok(Value::String(cursor.read_string()?)),
            AvroSchema::Record { fields, .. } => {
                let mut record = Map::new();
                for (name, field_schema) in fields {
                    let value = self.decode_node(field_schema, cursor)?;
                    record.insert(name.clone(), value);
                }
                Ok(Value::Object(record))
            }
            AvroSchema::Enum { symbols, .. } => {
                let index = cursor.read_long()?;
                let symbol = usize::try_from(index)
                    .ok()
                    .and_then(|i| symbols.get(i))
                    .ok_or(DecodeError::EnumIndexOutOfRange(index))?;
                Ok(Value::String(symbol.clone()))
            }
            AvroSchema::Array(items) => {
                let mut out = Vec::new();
                loop {
                    let count = cursor.read_block_count()?;
                    if count == 0 {
                        break;
                    }
                    for _ in 0..count {
                        out.push(self.decode_node(items, cursor)?);
                    }
                }
                Ok(Value::Array(out))
            }
            AvroSchema::Map(values) => {
                let mut out = Map::new();
                loop {
                    let count = cursor.read_block_count()?;
                    if count == 0 {
                        break;
                    }
                    for _ in 0..count {
                        let key = cursor.read_string()?;
                        let value = self.decode_node(values, cursor)?;
                        out.insert(key, value);
                    }
                }
                Ok(Value::Object(out))
            }
            AvroSchema::Fixed { size, .. } => {
                let raw = cursor.read_exact(*size)?;
                Ok(Value::String(BASE64.encode(raw)))
            }
            AvroSchema::Union(branches) => {
                let index = cursor.read_long()?;
                let branch = usize::try_from(index)
                    .ok()
                    .and_then(|i| branches.get(i))
                    .ok_or(DecodeError::UnionIndexOutOfRange(index))?;
                self.decode_node(branch, cursor)
            }
            AvroSchema::Ref(name) => {
                let resolved = self
                    .named_types
                    .get(name)
                    .ok_or_else(|| DecodeError::UnknownTypeReference(name.clone()))?;
                self.decode_node(resolved, cursor)
            }
        }
    }
}

fn number_from_f64(value: f64) -> Result<Value, DecodeError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or(DecodeError::NonFiniteNumber)
}

/// Resolve one schema JSON node into the sum type, registering every named
/// type encountered along the way. First definition of a name wins.
fn parse_schema_node(
    node: &Value,
    named_types: &mut HashMap<String, AvroSchema>,
) -> Result<AvroSchema, DecodeError> {
    match node {
        Value::Array(branches) => {
            let mut parsed = Vec::with_capacity(branches.len());
            for branch in branches {
                parsed.push(parse_schema_node(branch, named_types)?);
            }
            Ok(AvroSchema::Union(parsed))
        }
        Value::String(name) => Ok(schema_for_type_name(name)),
        Value::Object(map) => match map.get("type") {
            Some(inner @ Value::Array(_)) | Some(inner @ Value::Object(_)) => {
                parse_schema_node(inner, named_types)
            }
            Some(Value::String(type_name)) => {
                parse_complex_node(type_name, map, named_types)
            }
            _ => Err(DecodeError::InvalidSchemaNode(node.to_string())),
        },
        other => Err(DecodeError::InvalidSchemaNode(other.to_string())),
    }
}

fn schema_for_type_name(name: &str) -> AvroSchema {
    match name {
        "null" => AvroSchema::Null,
        "boolean" => AvroSchema::Boolean,
        "int" => AvroSchema::Int,
        "long" => AvroSchema::Long,
        "float" => AvroSchema::Float,
        "double" => AvroSchema::Double,
        "bytes" => AvroSchema::Bytes,
        "string" => AvroSchema::String,
        other => AvroSchema::Ref(other.to_string()),
    }
}

fn parse_complex_node(
    type_name: &str,
    map: &Map<String, Value>,
    named_types: &mut HashMap<String, AvroSchema>,
) -> Result<AvroSchema, DecodeError> {
    match type_name {
        "record" => {
            let name = require_name(map, "record")?;
            let Some(Value::Array(raw_fields)) = map.get("fields") else {
                return Err(DecodeError::IncompleteDefinition {
                    kind: "record",
                    missing: "a fields array",
                });
            };
            let mut fields = Vec::with_capacity(raw_fields.len());
            let null = Value::Null;
            for raw in raw_fields {
                let Some(field_name) = raw.get("name").and_then(Value::as_str) else {
                    return Err(DecodeError::IncompleteDefinition {
                        kind: "record field",
                        missing: "a name",
                    });
                };
                let field_type = raw.get("type").unwrap_or(&null);
                let parsed = parse_schema_node(field_type, named_types)?;
                fields.push((field_name.to_string(), parsed));
            }
            let record = AvroSchema::Record {
                name: name.clone(),
                fields,
            };
            named_types.entry(name).or_insert_with(|| record.clone());
            Ok(record)
        }
        "enum" => {
            let name = require_name(map, "enum")?;
            let Some(Value::Array(raw_symbols)) = map.get("symbols") else {
                return Err(DecodeError::IncompleteDefinition {
                    kind: "enum",
                    missing: "a symbols array",
                });
            };
            let symbols = raw_symbols
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect::<Vec<_>>();
            if symbols.len() != raw_symbols.len() {
                return Err(DecodeError::IncompleteDefinition {
                    kind: "enum",
                    missing: "string symbols",
                });
            }
            let parsed = AvroSchema::Enum {
                name: name.clone(),
                symbols,
            };
            named_types.entry(name).or_insert_with(|| parsed.clone());
            Ok(parsed)
        }
        "fixed" => {
            let name = require_name(map, "fixed")?;
            let size = map
                .get("size")
                .and_then(Value::as_u64)
                .ok_or(DecodeError::IncompleteDefinition {
                    kind: "fixed",
                    missing: "a non-negative integer size",
                })?;
            let parsed = AvroSchema::Fixed {
                name: name.clone(),
                size: size as usize,
            };
            named_types.entry(name).or_insert_with(|| parsed.clone());
            Ok(parsed)
        }
        "array" => {
            let items = map.get("items").ok_or(DecodeError::IncompleteDefinition {
                kind: "array",
                missing: "an items schema",
            })?;
            Ok(AvroSchema::Array(Box::new(parse_schema_node(
                items,
                named_types,
            )?)))
        }
        "map" => {
            let values = map.get("values").ok_or(DecodeError::IncompleteDefinition {
                kind: "map",
                missing: "a values schema",
            })?;
            Ok(AvroSchema::Map(Box::new(parse_schema_node(
                values,
                named_types,
            )?)))
        }
        other => Ok(schema_for_type_name(other)),
    }
}

fn require_name(map: &Map<String, Value>, kind: &'static str) -> Result<String, DecodeError> {
    map.get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(DecodeError::IncompleteDefinition {
            kind,
            missing: "a name",
        })
}

/// Byte cursor over one payload.
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn read_exact(&mut self, size: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .offset
            .checked_add(size)
            .ok_or(DecodeError::ShortBuffer)?;
        if end > self.data.len() {
            return Err(DecodeError::ShortBuffer);
        }
        let chunk = &self.data[self.offset..end];
        self.offset = end;
        Ok(chunk)
    }

    /// Read a zigzag-encoded variable-length long.
    fn read_long(&mut self) -> Result<i64, DecodeError> {
        let mut shift = 0u32;
        let mut raw: u64 = 0;
        loop {
            let byte = self.read_exact(1)?[0];
            raw |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift > 63 {
                return Err(DecodeError::VarintTooLong);
            }
        }
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    /// Block count for array/map decoding. A negative count carries a byte
    /// size for the block in a following long; read and discard it, the item
    /// count is the absolute value.
    fn read_block_count(&mut self) -> Result<u64, DecodeError> {
        let count = self.read_long()?;
        if count < 0 {
            let _block_size = self.read_long()?;
            Ok(count.unsigned_abs())
        } else {
            Ok(count as u64)
        }
    }

    fn read_length_prefixed(&mut self) -> Result<&'a [u8], DecodeError> {
        let length = self.read_long()?;
        if length < 0 {
            return Err(DecodeError::NegativeLength);
        }
        self.read_exact(length as usize)
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let raw = self.read_length_prefixed()?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8)
    }
}
