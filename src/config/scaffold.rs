//! Placeholder configuration writer
//!
//! Renders a commented starter configuration for operators to fill in.
//! Refuses to overwrite an existing file.

use std::path::{Path, PathBuf};

use super::{
    ConfigError, DEFAULT_AUTO_OFFSET_RESET, DEFAULT_DISPATCH_PARALLELISM,
    DEFAULT_KAFKA_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_SMTP_TIMEOUT_SECS,
};

/// Write a commented placeholder configuration and return its resolved path.
pub fn write_placeholder_config(output_path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
    let path = output_path.as_ref();
    if path.exists() {
        return Err(ConfigError::Invalid(format!(
            "refusing to overwrite existing file: {}",
            path.display()
        )));
    }
    std::fs::write(path, placeholder_contents()).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    Ok(path.to_path_buf())
}

fn placeholder_contents() -> String {
    format!(
        r#"# streamcheck configuration
#
# Fill in every placeholder before running `streamcheck run`.

[schema]
# Exactly one of `avsc` or `json_schema` must be set. Either inline the
# schema text or point at a file relative to this configuration file.
avsc = {{ path = "event.avsc" }}
# json_schema = {{ path = "event.schema.json" }}

[matching]
# Flattened schema paths used to correlate observed events with test cases.
from_field = "sender"
subject_field = "subject"

[smtp]
host = "mail.example.org"
port = 25
# username = ""
# password = ""
timeout_seconds = {smtp_timeout}
# Upper bound on concurrent outbound sends.
parallelism = {parallelism}

[mail]
# Destination inbox the system under test watches.
to_address = "inbox@example.org"
# cc = []
# bcc = []

[kafka]
bootstrap_servers = ["broker-1:9092"]
topic = "events"
# group_id = "streamcheck"
# Observation window, measured from run start.
timeout_seconds = {kafka_timeout}
poll_interval_ms = {poll_interval}
auto_offset_reset = "{offset_reset}"

# Extra consumer properties are passed through to the transport untouched.
# [kafka.security]
# "security.protocol" = "SASL_SSL"
# "sasl.mechanism" = "PLAIN"
"#,
        smtp_timeout = DEFAULT_SMTP_TIMEOUT_SECS,
        parallelism = DEFAULT_DISPATCH_PARALLELISM,
        kafka_timeout = DEFAULT_KAFKA_TIMEOUT_SECS,
        poll_interval = DEFAULT_POLL_INTERVAL_MS,
        offset_reset = DEFAULT_AUTO_OFFSET_RESET,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_parseable_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("streamcheck.toml");
        let written = write_placeholder_config(&target).unwrap();
        let text = std::fs::read_to_string(written).unwrap();
        let parsed: super::super::ConfigFile = toml::from_str(&text).unwrap();
        assert!(parsed.schema.avsc.is_some());
    }

    #[test]
    fn refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("streamcheck.toml");
        std::fs::write(&target, "existing").unwrap();
        assert!(write_placeholder_config(&target).is_err());
    }
}
