//! Default constants for streamcheck configuration

/// Default configuration file name
pub const DEFAULT_CONFIG_FILENAME: &str = "streamcheck.toml";

/// Default SMTP connection/command timeout in seconds
pub const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;

/// Default number of concurrent outbound sends
pub const DEFAULT_DISPATCH_PARALLELISM: usize = 4;

/// Default consumer group id when none is configured
pub const DEFAULT_GROUP_ID: &str = "streamcheck";

/// Default observation-window length in seconds
pub const DEFAULT_KAFKA_TIMEOUT_SECS: u64 = 600;

/// Default poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default auto.offset.reset policy
pub const DEFAULT_AUTO_OFFSET_RESET: &str = "latest";
