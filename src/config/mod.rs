//! Configuration for streamcheck
//!
//! Organized the same way as the file format: one runtime struct per TOML
//! section, produced by validating the permissive [`ConfigFile`] structs.
//!
//! - `defaults` - default constants
//! - `file` - TOML file structs
//! - `scaffold` - commented placeholder configuration writer

mod defaults;
pub mod file;
mod scaffold;

pub use defaults::*;
pub use file::ConfigFile;
pub use scaffold::write_placeholder_config;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::schema::{flatten_schema, load_schema_document, SchemaType};

use file::{KafkaSection, MailSection, MatchingSection, SchemaSection, SchemaSource, SmtpSection};

/// Configuration loading and validation errors. Fatal to the run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to parse configuration file: {0}")]
    Parse(String),

    #[error("{0}")]
    Invalid(String),

    #[error("failed to read {path}: {detail}")]
    Io { path: PathBuf, detail: String },
}

/// Normalized schema settings
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    pub schema_type: SchemaType,
    pub text: String,
    pub source_path: Option<PathBuf>,
}

/// Field paths used for matching stream records with test cases
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub from_field: String,
    pub subject_field: String,
}

/// SMTP server connectivity configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: u64,
    pub parallelism: usize,
}

/// Destination mailbox configuration
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub to_address: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

/// Kafka consumer configuration
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub bootstrap_servers: Vec<String>,
    pub topic: String,
    pub group_id: Option<String>,
    pub security: BTreeMap<String, String>,
    pub timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub auto_offset_reset: String,
}

/// Top-level configuration aggregate
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub schema: SchemaConfig,
    pub matching: MatchingConfig,
    pub smtp: SmtpConfig,
    pub mail: MailConfig,
    pub kafka: KafkaConfig,
}

/// Load and validate a configuration file.
///
/// The matching fields are validated against the flattened schema here, so a
/// loaded `Config` is guaranteed internally consistent before any dispatch or
/// consumption starts.
pub fn load_config(config_path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = config_path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let parsed: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let schema = validate_schema_section(&parsed.schema, base_dir)?;

    let document = load_schema_document(schema.schema_type, &schema.text)
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let fields =
        flatten_schema(&document).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    let field_paths: Vec<&str> = fields.iter().map(|f| f.path.as_str()).collect();

    let matching = validate_matching_section(&parsed.matching, &field_paths)?;
    let smtp = validate_smtp_section(&parsed.smtp)?;
    let mail = validate_mail_section(&parsed.mail)?;
    let kafka = validate_kafka_section(&parsed.kafka)?;

    Ok(Config {
        path: path.to_path_buf(),
        schema,
        matching,
        smtp,
        mail,
        kafka,
    })
}

fn validate_schema_section(
    section: &SchemaSection,
    base_dir: &Path,
) -> Result<SchemaConfig, ConfigError> {
    let (schema_type, source) = match (&section.avsc, &section.json_schema) {
        (Some(source), None) => (SchemaType::Avsc, source),
        (None, Some(source)) => (SchemaType::JsonSchema, source),
        _ => {
            return Err(ConfigError::Invalid(
                "exactly one event schema type (avsc or json_schema) must be provided".to_string(),
            ))
        }
    };

    let (text, source_path) = resolve_schema_source(source, base_dir)?;
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid("schema text cannot be empty".to_string()));
    }
    Ok(SchemaConfig {
        schema_type,
        text,
        source_path,
    })
}

fn resolve_schema_source(
    source: &SchemaSource,
    base_dir: &Path,
) -> Result<(String, Option<PathBuf>), ConfigError> {
    match source {
        SchemaSource::Inline(text) => Ok((text.clone(), None)),
        SchemaSource::Located { inline, path } => match (inline, path) {
            (Some(_), Some(_)) => Err(ConfigError::Invalid(
                "schema definition must not set both inline and path".to_string(),
            )),
            (Some(text), None) => Ok((text.clone(), None)),
            (None, Some(raw_path)) => {
                let schema_path = resolve_path(base_dir, raw_path);
                if !schema_path.exists() {
                    return Err(ConfigError::Invalid(format!(
                        "schema file not found: {}",
                        schema_path.display()
                    )));
                }
                let text = std::fs::read_to_string(&schema_path).map_err(|e| ConfigError::Io {
                    path: schema_path.clone(),
                    detail: e.to_string(),
                })?;
                Ok((text, Some(schema_path)))
            }
            (None, None) => Err(ConfigError::Invalid(
                "schema definition requires either inline or path".to_string(),
            )),
        },
    }
}

fn validate_matching_section(
    section: &MatchingSection,
    available_fields: &[&str],
) -> Result<MatchingConfig, ConfigError> {
    let from_field = require_non_empty(&section.from_field, "matching.from_field")?;
    let subject_field = require_non_empty(&section.subject_field, "matching.subject_field")?;
    for (field, label) in [
        (&from_field, "matching.from_field"),
        (&subject_field, "matching.subject_field"),
    ] {
        if !available_fields.contains(&field.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "{label} '{field}' does not exist in schema"
            )));
        }
    }
    Ok(MatchingConfig {
        from_field,
        subject_field,
    })
}

fn validate_smtp_section(section: &SmtpSection) -> Result<SmtpConfig, ConfigError> {
    let host = require_non_empty(&section.host, "smtp.host")?;
    let port = require_positive(section.port, "smtp.port")?;
    let port = u16::try_from(port)
        .map_err(|_| ConfigError::Invalid("smtp.port must fit a TCP port".to_string()))?;
    let timeout_seconds = require_positive(
        section.timeout_seconds.or(Some(DEFAULT_SMTP_TIMEOUT_SECS as i64)),
        "smtp.timeout_seconds",
    )?;
    let parallelism = require_positive(
        section.parallelism.or(Some(DEFAULT_DISPATCH_PARALLELISM as i64)),
        "smtp.parallelism",
    )?;
    Ok(SmtpConfig {
        host,
        port,
        username: optional_trimmed(&section.username),
        password: optional_trimmed(&section.password),
        timeout_seconds: timeout_seconds as u64,
        parallelism: parallelism as usize,
    })
}

fn validate_mail_section(section: &MailSection) -> Result<MailConfig, ConfigError> {
    let to_address = require_non_empty(&section.to_address, "mail.to_address")?;
    Ok(MailConfig {
        to_address,
        cc: section.cc.as_ref().map(|v| v.normalized()).unwrap_or_default(),
        bcc: section.bcc.as_ref().map(|v| v.normalized()).unwrap_or_default(),
    })
}

fn validate_kafka_section(section: &KafkaSection) -> Result<KafkaConfig, ConfigError> {
    let bootstrap_servers = section
        .bootstrap_servers
        .as_ref()
        .map(|v| v.normalized())
        .unwrap_or_default();
    if bootstrap_servers.is_empty() {
        return Err(ConfigError::Invalid(
            "kafka.bootstrap_servers must contain at least one server".to_string(),
        ));
    }
    let topic = require_non_empty(&section.topic, "kafka.topic")?;
    let timeout_seconds = require_positive(
        section.timeout_seconds.or(Some(DEFAULT_KAFKA_TIMEOUT_SECS as i64)),
        "kafka.timeout_seconds",
    )?;
    let poll_interval_ms = require_positive(
        section.poll_interval_ms.or(Some(DEFAULT_POLL_INTERVAL_MS as i64)),
        "kafka.poll_interval_ms",
    )?;
    let auto_offset_reset = section
        .auto_offset_reset
        .as_deref()
        .unwrap_or(DEFAULT_AUTO_OFFSET_RESET)
        .trim()
        .to_lowercase();
    if auto_offset_reset.is_empty() {
        return Err(ConfigError::Invalid(
            "kafka.auto_offset_reset must not be empty".to_string(),
        ));
    }
    Ok(KafkaConfig {
        bootstrap_servers,
        topic,
        group_id: optional_trimmed(&section.group_id),
        security: section.security.clone().unwrap_or_default(),
        timeout_seconds: timeout_seconds as u64,
        poll_interval_ms: poll_interval_ms as u64,
        auto_offset_reset,
    })
}

fn resolve_path(base_dir: &Path, raw_path: &str) -> PathBuf {
    let candidate = Path::new(raw_path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base_dir.join(candidate)
    }
}

fn require_non_empty(value: &Option<String>, field_name: &str) -> Result<String, ConfigError> {
    let trimmed = value.as_deref().map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field_name} must not be empty")));
    }
    Ok(trimmed.to_string())
}

fn optional_trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn require_positive(value: Option<i64>, field_name: &str) -> Result<i64, ConfigError> {
    match value {
        Some(v) if v > 0 => Ok(v),
        Some(_) => Err(ConfigError::Invalid(format!(
            "{field_name} must be greater than zero"
        ))),
        None => Err(ConfigError::Invalid(format!("{field_name} must not be empty"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const VALID: &str = r#"
        [schema]
        avsc = '''
        {
            "type": "record",
            "name": "Event",
            "fields": [
                {"name": "sender", "type": "string"},
                {"name": "subject", "type": "string"}
            ]
        }
        '''

        [matching]
        from_field = "sender"
        subject_field = "subject"

        [smtp]
        host = "mail.internal"
        port = 25

        [mail]
        to_address = "inbox@example.org"

        [kafka]
        bootstrap_servers = ["broker-1:9092"]
        topic = "events"
    "#;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_valid_config_with_defaults() {
        let file = write_config(VALID);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.smtp.timeout_seconds, DEFAULT_SMTP_TIMEOUT_SECS);
        assert_eq!(config.smtp.parallelism, DEFAULT_DISPATCH_PARALLELISM);
        assert_eq!(config.kafka.timeout_seconds, DEFAULT_KAFKA_TIMEOUT_SECS);
        assert_eq!(config.kafka.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.kafka.auto_offset_reset, "latest");
        assert_eq!(config.matching.from_field, "sender");
    }

    #[test]
    fn missing_file_is_reported() {
        assert!(matches!(
            load_config("/nonexistent/streamcheck.toml"),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn both_schema_dialects_is_an_error() {
        let contents = VALID.replace(
            "[matching]",
            "json_schema = \"{}\"\n\n        [matching]",
        );
        let file = write_config(&contents);
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn matching_field_must_exist_in_schema() {
        let contents = VALID.replace("from_field = \"sender\"", "from_field = \"absent\"");
        let file = write_config(&contents);
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("does not exist in schema"));
    }

    #[test]
    fn zero_port_is_rejected() {
        let contents = VALID.replace("port = 25", "port = 0");
        let file = write_config(&contents);
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("smtp.port"));
    }
}
