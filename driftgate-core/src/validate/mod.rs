//! Validation checks: schema conformance, distribution drift and drift reports.

pub mod conformance;
pub mod drift;
pub mod report;
pub mod stats;

pub use conformance::{
    ConformanceOutcome, ConformancePolicy, SchemaConformanceChecker, SchemaFailure,
};
pub use drift::{ColumnDriftResult, DEFAULT_THRESHOLD, DistributionDriftDetector, DriftReport};
pub use report::{read_report, write_report};
pub use stats::{StatsError, TestKind, TestOutcome};
