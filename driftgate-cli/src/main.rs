//! driftgate CLI: validate a train/test split before model building.

mod commands;

use clap::Parser;
use driftgate_core::config::{ConfigOverrides, DriftOverrides, SchemaOverrides, ValidationConfig};
use driftgate_core::validate::ConformancePolicy;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// driftgate: schema conformance and drift gate for dataset splits
#[derive(Parser, Debug)]
#[command(name = "driftgate", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Validate a train/test pair and write the drift report and artifact
    Validate {
        /// Training split (baseline)
        #[arg(long)]
        train: PathBuf,

        /// Held-out split (candidate)
        #[arg(long)]
        test: PathBuf,

        /// Schema file, overrides `schema_path`
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Output root, overrides `artifact_dir`
        #[arg(short, long)]
        artifact_dir: Option<PathBuf>,

        /// Drift p-value threshold, overrides `drift.threshold`
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Check column names and types, not just the column count
        #[arg(long)]
        strict: bool,

        /// Let schema failures fail the run
        #[arg(long)]
        schema_affects_status: bool,
    },
    /// Check a single CSV file against the schema
    Check {
        /// CSV file to check
        file: PathBuf,

        /// Schema file, overrides `schema_path`
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Check column names and types, not just the column count
        #[arg(long)]
        strict: bool,
    },
    /// Summarise an existing drift report
    Report {
        /// Path to a report.yaml
        path: PathBuf,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default driftgate.toml
    Init {
        /// Destination file
        #[arg(default_value = "driftgate.toml")]
        path: PathBuf,
    },
    /// Print the effective configuration
    Show,
}

impl Commands {
    /// Configuration values set by this command's flags.
    fn config_overrides(&self) -> ConfigOverrides {
        match self {
            Self::Validate {
                schema,
                artifact_dir,
                threshold,
                strict,
                schema_affects_status,
                ..
            } => ConfigOverrides {
                artifact_dir: artifact_dir.clone(),
                schema_path: schema.clone(),
                drift: DriftOverrides {
                    threshold: *threshold,
                },
                schema: SchemaOverrides {
                    policy: strict.then_some(ConformancePolicy::Strict),
                    affects_status: schema_affects_status.then_some(true),
                },
            },
            Self::Check { schema, strict, .. } => ConfigOverrides {
                schema_path: schema.clone(),
                schema: SchemaOverrides {
                    policy: strict.then_some(ConformancePolicy::Strict),
                    ..SchemaOverrides::default()
                },
                ..ConfigOverrides::default()
            },
            Self::Report { .. } | Self::Config { .. } => ConfigOverrides::default(),
        }
    }
}

/// Directory for the JSON log files of a run.
fn log_dir(config: &ValidationConfig) -> PathBuf {
    config.artifact_dir.join("logs")
}

fn main() -> anyhow::Result<ExitCode> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let overrides = cli.command.config_overrides();
    let config = driftgate_core::load_config(cli.config.as_deref(), Some(&overrides))
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    let log_dir = log_dir(&config);
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "driftgate.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, config, cli.config.as_deref())
}
