//! Drift report persistence.
//!
//! Reports are YAML documents keyed by column name. Every write replaces the
//! previous file wholesale; nothing is merged or appended.

use crate::error::{ErrorKind, Result, ValidationError};
use crate::persistence::atomic_write_yaml;
use crate::validate::drift::DriftReport;
use std::path::Path;

/// Write `report` to `path`, creating parent directories as needed.
pub fn write_report(path: &Path, report: &DriftReport) -> Result<()> {
    atomic_write_yaml(path, report)
        .map_err(|e| ValidationError::new("write_report", ErrorKind::persistence(path, e)))?;
    tracing::info!(path = %path.display(), "Drift report written");
    Ok(())
}

/// Read a report previously produced by [`write_report`].
pub fn read_report(path: &Path) -> Result<DriftReport> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ValidationError::new(
            "read_report",
            ErrorKind::load(path, format!("failed to read report: {e}")),
        )
    })?;
    serde_yaml::from_str(&content).map_err(|e| {
        ValidationError::new(
            "read_report",
            ErrorKind::load(path, format!("malformed report: {e}")),
        )
    })
}
