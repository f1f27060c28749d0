//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use driftgate_core::config::ValidationConfig;
use driftgate_core::data::{load_schema, read_dataset};
use driftgate_core::validate::{DriftReport, SchemaConformanceChecker, read_report};
use driftgate_core::{DatasetRole, IngestionArtifact, ValidationOrchestrator};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    config: ValidationConfig,
    config_path: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Validate { train, test, .. } => handle_validate(train, test, config),
        Commands::Check { file, .. } => handle_check(&file, &config),
        Commands::Report { path } => handle_report(&path),
        Commands::Config { action } => handle_config(action, config, config_path),
    }
}

fn handle_validate(
    train: PathBuf,
    test: PathBuf,
    config: ValidationConfig,
) -> anyhow::Result<ExitCode> {
    let ingestion = IngestionArtifact {
        train_file_path: train,
        test_file_path: test,
    };
    let orchestrator = ValidationOrchestrator::new(ingestion, config)?;
    let artifact = orchestrator.run().map_err(|e| {
        if e.is_persistence() {
            anyhow::Error::new(e).context("could not write validation outputs")
        } else if e.is_load() {
            anyhow::Error::new(e).context("could not read validation inputs")
        } else {
            anyhow::Error::new(e)
        }
    })?;
    if !artifact.validation_status {
        tracing::warn!(
            report = %artifact.drift_report_file_path.display(),
            "Validation failed"
        );
    }

    for failure in &artifact.schema_failures {
        eprintln!("  schema: {}", failure.message);
    }
    println!("{}", serde_json::to_string_pretty(&artifact)?);

    Ok(if artifact.validation_status {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn handle_check(file: &Path, config: &ValidationConfig) -> anyhow::Result<ExitCode> {
    let schema = load_schema(&config.schema_path)?;
    let dataset = read_dataset(file)?;
    let outcome = SchemaConformanceChecker::new(config.schema.policy).inspect(&dataset, &schema);

    // A lone file is described as the training split.
    let summary = outcome
        .describe(DatasetRole::Train)
        .replacen("train dataset", &file.display().to_string(), 1);
    println!("{summary}");
    Ok(if outcome.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn handle_report(path: &Path) -> anyhow::Result<ExitCode> {
    let report = read_report(path)?;
    print!("{}", render_report(&report));
    Ok(if report.status {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Plain-text table of a drift report.
fn render_report(report: &DriftReport) -> String {
    let width = report
        .columns
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(6)
        .max(6);
    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  {:>12}  {:<8}  test", "column", "p_value", "drift");
    for (name, result) in &report.columns {
        let p = result
            .p_value
            .map(|p| format!("{p:.6e}"))
            .unwrap_or_else(|| "-".to_string());
        let drift = if !result.is_evaluated() {
            "skipped"
        } else if result.drift_status {
            "yes"
        } else {
            "no"
        };
        let test = match (&result.test, &result.not_evaluated) {
            (Some(kind), _) => format!("{kind:?}"),
            (None, Some(reason)) => reason.clone(),
            (None, None) => String::new(),
        };
        let _ = writeln!(out, "{name:<width$}  {p:>12}  {drift:<8}  {test}");
    }
    let _ = writeln!(
        out,
        "\nthreshold {}: {}",
        report.threshold,
        if report.status { "no drift detected" } else { "drift detected" }
    );
    out
}

fn handle_config(
    action: ConfigAction,
    config: ValidationConfig,
    config_path: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    match action {
        ConfigAction::Init { path } => {
            if path.exists() {
                println!("Configuration file already exists at: {}", path.display());
                return Ok(ExitCode::SUCCESS);
            }
            let toml_str = toml::to_string_pretty(&ValidationConfig::default())?;
            std::fs::write(&path, &toml_str)?;
            tracing::debug!(path = %path.display(), "Wrote default configuration");
            println!("Created default configuration at: {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        ConfigAction::Show => {
            if let Some(path) = config_path {
                println!("# loaded from {}", path.display());
            }
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}
