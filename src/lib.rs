#![cfg_attr(not(test), deny(clippy::unwrap_used))]

//! # streamcheck
//!
//! A schema-driven end-to-end validation harness: dispatch one test e-mail
//! per enabled test case, observe the events the system under test publishes
//! to a Kafka topic, and validate every expected field value against what
//! actually arrived.
//!
//! ## How a run works
//!
//! 1. Configuration, the event schema (Avro or JSON Schema) and the test-case
//!    file are loaded and cross-validated.
//! 2. The stream observation window opens and outbound dispatch starts
//!    concurrently with it; both complete before matching begins.
//! 3. Each observed payload is Avro-decoded (Confluent-framed or bare) and
//!    flattened over the schema's field paths.
//! 4. The matching engine correlates actual events to expected events by
//!    sender, disambiguates collisions by subject, and validates every
//!    asserted field, producing a deterministic result that places every
//!    event in exactly one outcome bucket.
//! 5. The full result is written as a JSON run report.
//!
//! ## Modules
//!
//! - [`config`]: TOML configuration loading and validation
//! - [`schema`]: schema documents, flattening, Avro binary decoding
//! - [`cases`]: test-case source and validation
//! - [`dispatch`]: bounded-parallel outbound dispatch over a mail transport
//! - [`consume`]: time-windowed stream consumption over a stream transport
//! - [`matching`]: the matching and validation engine
//! - [`report`]: run report rendering
//! - [`run`]: run orchestration
//! - [`error`]: error types and the `Result` alias
//!
//! ## Library Usage
//!
//! ```no_run
//! use streamcheck::run::{execute_run, RunRequest};
//!
//! #[tokio::main]
//! async fn main() -> streamcheck::Result<()> {
//!     let outcome = execute_run(&RunRequest {
//!         config_path: "streamcheck.toml".into(),
//!         input_path: "cases.json".into(),
//!         output_dir: None,
//!         dry_run: false,
//!     })
//!     .await?;
//!     println!("report: {}", outcome.output_path.display());
//!     Ok(())
//! }
//! ```

pub mod cases;
pub mod config;
pub mod consume;
pub mod dispatch;
pub mod error;
pub mod matching;
pub mod report;
pub mod run;
pub mod schema;

pub use error::{Result, StreamcheckError};
