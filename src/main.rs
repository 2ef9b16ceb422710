//! streamcheck - schema-driven e-mail/stream validation harness

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use streamcheck::config::{load_config, write_placeholder_config, DEFAULT_CONFIG_FILENAME};
use streamcheck::run::{execute_run, load_run_artifacts, RunRequest};
use streamcheck::schema::{flatten_schema, load_schema_document};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "streamcheck")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Schema-driven end-to-end validation: send test e-mails, verify the resulting stream events")]
struct Cli {
    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, env = "STREAMCHECK_LOG", default_value = "info", global = true)]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a commented placeholder configuration file
    GenerateConfig {
        /// Path of the configuration file to write
        #[arg(long, default_value = DEFAULT_CONFIG_FILENAME)]
        output: PathBuf,
    },

    /// Load configuration and cases, print the flattened schema paths
    Validate {
        /// Path to the TOML configuration file
        #[arg(long)]
        config: PathBuf,

        /// Optional path to a JSON case file to validate as well
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Execute a validation run
    Run {
        /// Path to the TOML configuration file
        #[arg(long)]
        config: PathBuf,

        /// Path to the JSON case file
        #[arg(long)]
        input: PathBuf,

        /// Directory for the run report (defaults to the input's directory)
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Skip SMTP and stream interactions, write a skipped-results report
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match execute(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn execute(command: Command) -> streamcheck::Result<()> {
    match command {
        Command::GenerateConfig { output } => {
            let written = write_placeholder_config(&output)?;
            println!("{}", written.display());
            Ok(())
        }
        Command::Validate { config, input } => {
            match input {
                Some(input) => {
                    let artifacts = load_run_artifacts(&RunRequest {
                        config_path: config,
                        input_path: input,
                        output_dir: None,
                        dry_run: true,
                    })?;
                    for field in &artifacts.fields {
                        println!("{}", field.path);
                    }
                    println!(
                        "{} cases ({} enabled)",
                        artifacts.cases.len(),
                        artifacts.cases.iter().filter(|c| c.enabled).count()
                    );
                }
                None => {
                    let config = load_config(&config)?;
                    let document =
                        load_schema_document(config.schema.schema_type, &config.schema.text)?;
                    for field in flatten_schema(&document)? {
                        println!("{}", field.path);
                    }
                }
            }
            Ok(())
        }
        Command::Run {
            config,
            input,
            output_dir,
            dry_run,
        } => {
            let outcome = execute_run(&RunRequest {
                config_path: config,
                input_path: input,
                output_dir,
                dry_run,
            })
            .await?;
            println!("{}", outcome.output_path.display());
            Ok(())
        }
    }
}
