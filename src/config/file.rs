//! Configuration file support
//!
//! TOML configuration parsing. The raw file structs here are permissive;
//! everything is validated while converting into the runtime [`Config`]
//! aggregate in `config::mod`.
//!
//! ## Example Configuration
//!
//! ```toml
//! # streamcheck.toml
//!
//! [schema]
//! avsc = { path = "event.avsc" }
//!
//! [matching]
//! from_field = "sender"
//! subject_field = "subject"
//!
//! [smtp]
//! host = "mail.internal"
//! port = 25
//! parallelism = 4
//!
//! [mail]
//! to_address = "inbox@example.org"
//!
//! [kafka]
//! bootstrap_servers = ["broker-1:9092", "broker-2:9092"]
//! topic = "events"
//! timeout_seconds = 600
//! poll_interval_ms = 500
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;

/// Root structure of the TOML configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub schema: SchemaSection,
    pub matching: MatchingSection,
    pub smtp: SmtpSection,
    pub mail: MailSection,
    pub kafka: KafkaSection,
}

/// Event schema section; exactly one dialect key must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaSection {
    pub avsc: Option<SchemaSource>,
    pub json_schema: Option<SchemaSource>,
}

/// Schema text, inline or loaded from a path relative to the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SchemaSource {
    Inline(String),
    Located {
        inline: Option<String>,
        path: Option<String>,
    },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchingSection {
    pub from_field: Option<String>,
    pub subject_field: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmtpSection {
    pub host: Option<String>,
    pub port: Option<i64>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_seconds: Option<i64>,
    pub parallelism: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailSection {
    pub to_address: Option<String>,
    pub cc: Option<StringOrList>,
    pub bcc: Option<StringOrList>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KafkaSection {
    pub bootstrap_servers: Option<StringOrList>,
    pub topic: Option<String>,
    pub group_id: Option<String>,
    pub security: Option<BTreeMap<String, String>>,
    pub timeout_seconds: Option<i64>,
    pub poll_interval_ms: Option<i64>,
    pub auto_offset_reset: Option<String>,
}

/// A single string or a list of strings; both normalize to a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    /// Normalize to trimmed, non-empty entries. A single string splits on
    /// commas so `"a:9092,b:9092"` and `["a:9092", "b:9092"]` are equivalent.
    pub fn normalized(&self) -> Vec<String> {
        match self {
            StringOrList::One(value) => value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            StringOrList::Many(values) => values
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}
