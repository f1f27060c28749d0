//! # driftgate-core: dataset validation gate
//!
//! Checks a freshly split train/test pair before it moves on to model building:
//!
//! 1. **Schema conformance**: each dataset's columns against an external YAML schema
//! 2. **Distribution drift**: a two-sample test per shared column, train as baseline
//! 3. **Reporting**: a YAML drift report plus a JSON validation artifact
//!
//! [`ValidationOrchestrator`] sequences the whole run.

pub mod config;
pub mod data;
pub mod error;
pub mod persistence;
pub mod pipeline;
pub mod validate;

// Re-exports
pub use config::{ConfigOverrides, ValidationConfig, ValidationPaths, load_config};
pub use data::{Dataset, DatasetRole, SchemaDefinition, read_dataset};
pub use error::{ErrorKind, Result, ValidationError};
pub use pipeline::{IngestionArtifact, ValidationArtifact, ValidationOrchestrator};
pub use validate::{
    DistributionDriftDetector, DriftReport, SchemaConformanceChecker, read_report, write_report,
};
