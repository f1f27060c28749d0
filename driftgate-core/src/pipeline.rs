//! Validation orchestrator: load, conformance checks, drift detection,
//! persistence, artifact assembly.

use crate::config::{ValidationConfig, ValidationPaths};
use crate::data::dataset::{Dataset, DatasetRole, read_dataset, write_dataset};
use crate::data::schema::{SchemaDefinition, load_schema};
use crate::error::{ErrorKind, Result, ValidationError};
use crate::persistence::{atomic_write_json, remove_if_exists};
use crate::validate::conformance::{SchemaConformanceChecker, SchemaFailure};
use crate::validate::drift::{DistributionDriftDetector, DriftReport};
use crate::validate::report::write_report;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Output of the upstream ingestion stage: the freshly split train/test files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionArtifact {
    pub train_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

/// Result of a validation run, handed to the next pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationArtifact {
    pub validation_status: bool,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub invalid_train_file_path: Option<PathBuf>,
    pub invalid_test_file_path: Option<PathBuf>,
    pub drift_report_file_path: PathBuf,
    /// Aggregate drift status from the report (true = no drift).
    pub drift_status: bool,
    /// Every dataset that failed the schema check.
    #[serde(default)]
    pub schema_failures: Vec<SchemaFailure>,
}

impl ValidationArtifact {
    pub fn schema_passed(&self) -> bool {
        self.schema_failures.is_empty()
    }

    /// Load an artifact written by a previous run.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::new("load_artifact", ErrorKind::load(path, e.to_string()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ValidationError::new(
                "load_artifact",
                ErrorKind::load(path, format!("malformed artifact: {e}")),
            )
        })
    }
}

/// Sequences one validation run over a train/test pair.
pub struct ValidationOrchestrator {
    ingestion: IngestionArtifact,
    config: ValidationConfig,
    schema: SchemaDefinition,
    checker: SchemaConformanceChecker,
    detector: DistributionDriftDetector,
}

impl ValidationOrchestrator {
    /// Build an orchestrator, loading the schema named by `config.schema_path`.
    pub fn new(ingestion: IngestionArtifact, config: ValidationConfig) -> Result<Self> {
        let schema = load_schema(&config.schema_path)?;
        Self::with_schema(ingestion, config, schema)
    }

    /// Build an orchestrator around an already loaded schema.
    pub fn with_schema(
        ingestion: IngestionArtifact,
        config: ValidationConfig,
        schema: SchemaDefinition,
    ) -> Result<Self> {
        config.validate()?;
        if schema.is_empty() {
            return Err(ValidationError::new(
                "create_orchestrator",
                ErrorKind::schema("schema must declare at least one column"),
            ));
        }
        let checker = SchemaConformanceChecker::new(config.schema.policy);
        let detector = DistributionDriftDetector::from_config(&config.drift)?;
        Ok(Self {
            ingestion,
            config,
            schema,
            checker,
            detector,
        })
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Run validation with output paths resolved from the current time.
    pub fn run(&self) -> Result<ValidationArtifact> {
        self.run_with_paths(&self.config.paths())
    }

    /// Run validation writing every output under `paths`.
    pub fn run_with_paths(&self, paths: &ValidationPaths) -> Result<ValidationArtifact> {
        let started = Instant::now();
        tracing::info!(
            train = %self.ingestion.train_file_path.display(),
            test = %self.ingestion.test_file_path.display(),
            "Starting data validation"
        );

        let train = read_dataset(&self.ingestion.train_file_path)?;
        let test = read_dataset(&self.ingestion.test_file_path)?;

        let schema_failures: Vec<SchemaFailure> =
            [(DatasetRole::Train, &train), (DatasetRole::Test, &test)]
                .into_iter()
                .filter_map(|(role, dataset)| self.conformance_failure(role, dataset))
                .collect();

        // Drift detection runs even when the schema check failed.
        let report = self.detector.compute(&train, &test);
        write_report(&paths.drift_report_file_path, &report)?;

        let schema_ok = schema_failures.is_empty();
        let validation_status = if self.config.schema.affects_status {
            report.status && schema_ok
        } else {
            report.status
        };

        write_dataset(&paths.valid_train_file_path, &train)?;
        write_dataset(&paths.valid_test_file_path, &test)?;

        let (invalid_train_file_path, invalid_test_file_path) =
            if !validation_status && self.config.output.quarantine_invalid {
                write_dataset(&paths.invalid_train_file_path, &train)?;
                write_dataset(&paths.invalid_test_file_path, &test)?;
                (
                    Some(paths.invalid_train_file_path.clone()),
                    Some(paths.invalid_test_file_path.clone()),
                )
            } else {
                // Copies quarantined by an earlier run at the same location are stale now.
                for stale in [&paths.invalid_train_file_path, &paths.invalid_test_file_path] {
                    remove_if_exists(stale).map_err(|e| {
                        ValidationError::new(
                            "remove_quarantined_copy",
                            ErrorKind::persistence(stale, e),
                        )
                    })?;
                }
                (None, None)
            };

        let artifact = ValidationArtifact {
            validation_status,
            valid_train_file_path: paths.valid_train_file_path.clone(),
            valid_test_file_path: paths.valid_test_file_path.clone(),
            invalid_train_file_path,
            invalid_test_file_path,
            drift_report_file_path: paths.drift_report_file_path.clone(),
            drift_status: report.status,
            schema_failures,
        };
        atomic_write_json(&paths.artifact_file_path, &artifact).map_err(|e| {
            ValidationError::new(
                "write_artifact",
                ErrorKind::persistence(&paths.artifact_file_path, e),
            )
        })?;

        log_summary(&artifact, &report, started);
        Ok(artifact)
    }

    fn conformance_failure(&self, role: DatasetRole, dataset: &Dataset) -> Option<SchemaFailure> {
        let outcome = self.checker.inspect(dataset, &self.schema);
        if outcome.passed {
            return None;
        }
        let message = outcome.describe(role);
        tracing::warn!(dataset = %role, "{message}");
        Some(SchemaFailure {
            dataset: role,
            message,
            outcome,
        })
    }
}

fn log_summary(artifact: &ValidationArtifact, report: &DriftReport, started: Instant) {
    let drifted: Vec<&str> = report.drifted_columns().collect();
    tracing::info!(
        status = artifact.validation_status,
        drift_status = artifact.drift_status,
        schema_failures = artifact.schema_failures.len(),
        drifted = ?drifted,
        report = %artifact.drift_report_file_path.display(),
        dur_ms = started.elapsed().as_millis() as u64,
        "Data validation finished"
    );
}
