//! Schema flattening
//!
//! Projects a nested schema document onto an ordered list of dot-joined field
//! paths. Both dialects must flatten logically equivalent shapes to identical
//! path lists, so the traversal rules mirror each other: depth-first,
//! declaration order, recursing only into objects/records with declared
//! children. Arrays, scalars, and property-less objects register as leaves
//! holding the raw decoded value.

use serde_json::Value;
use std::collections::HashSet;

use super::{FlattenedField, SchemaDocument, SchemaError, SchemaType};

/// Flatten a schema document into its ordered field list.
///
/// A duplicate flattened path is a fatal schema error, as is a root that is
/// not a record/object with named children.
pub fn flatten_schema(document: &SchemaDocument) -> Result<Vec<FlattenedField>, SchemaError> {
    let mut fields = Vec::new();
    let mut seen_paths = HashSet::new();

    match document.schema_type {
        SchemaType::JsonSchema => {
            flatten_json_schema(&document.root, "", &mut fields, &mut seen_paths)?
        }
        SchemaType::Avsc => flatten_avro_schema(&document.root, "", &mut fields, &mut seen_paths)?,
    }

    Ok(fields)
}

fn flatten_json_schema(
    node: &Value,
    prefix: &str,
    fields: &mut Vec<FlattenedField>,
    seen_paths: &mut HashSet<String>,
) -> Result<(), SchemaError> {
    let Value::Object(map) = node else {
        return Err(SchemaError::NonObjectNode);
    };

    let node_types = json_schema_types(node);
    let is_object = node_types.iter().any(|t| t == "object");
    if is_object || map.contains_key("properties") {
        if let Some(Value::Object(properties)) = map.get("properties") {
            for (key, child) in properties {
                let child_path = join_path(prefix, key);
                flatten_json_schema(child, &child_path, fields, seen_paths)?;
            }
            return Ok(());
        }
        if is_object {
            // Object with no declared properties: opaque leaf.
            return register_field(prefix, node.clone(), fields, seen_paths);
        }
    }

    if node_types.iter().any(|t| t == "array") {
        return register_field(prefix, node.clone(), fields, seen_paths);
    }

    if !prefix.is_empty() {
        return register_field(prefix, node.clone(), fields, seen_paths);
    }

    Err(SchemaError::RootWithoutProperties)
}

/// Declared `type` names of a JSON schema node, with `null` union wrapping
/// collapsed to the non-null branches.
fn json_schema_types(node: &Value) -> Vec<String> {
    match node.get("type") {
        Some(Value::Array(values)) => {
            let filtered: Vec<String> = values
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|s| *s != "null")
                .map(str::to_string)
                .collect();
            if filtered.is_empty() {
                vec!["null".to_string()]
            } else {
                filtered
            }
        }
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn flatten_avro_schema(
    node: &Value,
    prefix: &str,
    fields: &mut Vec<FlattenedField>,
    seen_paths: &mut HashSet<String>,
) -> Result<(), SchemaError> {
    let (avro_type, definition) = resolve_avro_type(node)?;
    if avro_type == "record" {
        let Some(Value::Array(record_fields)) = definition.get("fields") else {
            return Err(SchemaError::RecordWithoutFields);
        };
        let null = Value::Null;
        for field in record_fields {
            let Some(name) = field.get("name").and_then(Value::as_str) else {
                return Err(SchemaError::NamelessField);
            };
            let child_path = join_path(prefix, name);
            let child_type = field.get("type").unwrap_or(&null);
            flatten_avro_schema(child_type, &child_path, fields, seen_paths)?;
        }
        return Ok(());
    }
    if !prefix.is_empty() {
        let registered = if definition.as_object().is_some_and(|m| !m.is_empty()) {
            definition
        } else {
            Value::String(avro_type)
        };
        return register_field(prefix, registered, fields, seen_paths);
    }
    Err(SchemaError::RootNotRecord)
}

/// Resolve an Avro node to its leaf-classifying type name plus the defining
/// object (empty for bare primitive names). Unions resolve to the first
/// non-null branch.
fn resolve_avro_type(schema: &Value) -> Result<(String, Value), SchemaError> {
    match schema {
        Value::Array(branches) => {
            let non_null = branches
                .iter()
                .find(|item| !matches!(item, Value::String(s) if s == "null"));
            match non_null {
                Some(branch) => resolve_avro_type(branch),
                None => Ok(("null".to_string(), schema.clone())),
            }
        }
        Value::String(name) => Ok((name.clone(), Value::Object(Default::default()))),
        Value::Object(map) => match map.get("type") {
            Some(inner @ Value::Array(_)) | Some(inner @ Value::Object(_)) => {
                resolve_avro_type(inner)
            }
            Some(Value::String(name)) => Ok((name.clone(), schema.clone())),
            _ => Err(SchemaError::UnsupportedSegment(schema.to_string())),
        },
        other => Err(SchemaError::UnsupportedSegment(other.to_string())),
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn register_field(
    path: &str,
    definition: Value,
    fields: &mut Vec<FlattenedField>,
    seen_paths: &mut HashSet<String>,
) -> Result<(), SchemaError> {
    if path.is_empty() {
        return Err(SchemaError::UnsupportedSegment(
            "cannot register a field without a path".to_string(),
        ));
    }
    if !seen_paths.insert(path.to_string()) {
        return Err(SchemaError::DuplicatePath(path.to_string()));
    }
    fields.push(FlattenedField {
        path: path.to_string(),
        definition,
    });
    Ok(())
}
