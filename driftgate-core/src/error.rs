//! Error types for the driftgate-core crate.
//!
//! Every fatal failure is carried as a single [`ValidationError`] that records
//! the operation that failed, the underlying cause and the source location of
//! the call site. Per-column statistical problems are not errors at this level;
//! see [`crate::validate::stats::StatsError`].

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

/// Underlying cause of a [`ValidationError`].
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("Load error for {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Persistence error for {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorKind {
    pub fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// A fatal error raised while validating a dataset pair.
#[derive(Debug, Error)]
pub struct ValidationError {
    /// Name of the step that failed, e.g. `read_dataset`.
    pub operation: &'static str,
    /// What went wrong.
    #[source]
    pub kind: ErrorKind,
    /// Call site that wrapped the failure.
    pub location: &'static Location<'static>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed at [{}:{}]: {}",
            self.operation,
            self.location.file(),
            self.location.line(),
            self.kind
        )
    }
}

impl ValidationError {
    /// Wrap `kind` with the operation name and the caller's location.
    #[track_caller]
    pub fn new(operation: &'static str, kind: impl Into<ErrorKind>) -> Self {
        Self {
            operation,
            kind: kind.into(),
            location: Location::caller(),
        }
    }

    /// Whether the failure came from reading an input file.
    pub fn is_load(&self) -> bool {
        matches!(self.kind, ErrorKind::Load { .. })
    }

    /// Whether the failure came from writing an output file.
    pub fn is_persistence(&self) -> bool {
        matches!(self.kind, ErrorKind::Persistence { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = ValidationError> = std::result::Result<T, E>;

/// Attach an operation name and call-site location to any convertible error.
pub trait ResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T, E: Into<ErrorKind>> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn during(self, operation: &'static str) -> Result<T> {
        let location = Location::caller();
        self.map_err(|e| ValidationError {
            operation,
            kind: e.into(),
            location,
        })
    }
}
