//! Per-column distribution drift detection between a baseline and a candidate dataset.

use crate::config::{CategoricalPolicy, DriftConfig};
use crate::data::dataset::{Column, ColumnValues, Dataset};
use crate::error::{ErrorKind, Result, ValidationError};
use crate::validate::report::write_report;
use crate::validate::stats::{
    DEFAULT_EXACT_MAX_PRODUCT, StatsError, TestKind, TestOutcome, chi_square_two_sample,
    ks_two_sample,
};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default significance threshold for the drift decision.
pub const DEFAULT_THRESHOLD: f64 = 0.05;

/// Drift result for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDriftResult {
    /// `None` when the column could not be tested.
    pub p_value: Option<f64>,
    /// True iff `p_value < threshold`.
    pub drift_status: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<TestKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistic: Option<f64>,
    /// Reason the column was excluded from testing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_evaluated: Option<String>,
}

impl ColumnDriftResult {
    pub fn evaluated(outcome: TestOutcome, threshold: f64) -> Self {
        Self {
            p_value: Some(outcome.p_value),
            drift_status: outcome.p_value < threshold,
            test: Some(outcome.kind),
            statistic: Some(outcome.statistic),
            not_evaluated: None,
        }
    }

    pub fn not_evaluated(reason: impl Into<String>) -> Self {
        Self {
            p_value: None,
            drift_status: false,
            test: None,
            statistic: None,
            not_evaluated: Some(reason.into()),
        }
    }

    pub fn is_evaluated(&self) -> bool {
        self.not_evaluated.is_none()
    }
}

/// Drift results for every column shared by the two datasets, in baseline order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub threshold: f64,
    /// True only if no evaluated column drifted.
    pub status: bool,
    pub columns: IndexMap<String, ColumnDriftResult>,
}

impl DriftReport {
    pub fn new(threshold: f64, columns: IndexMap<String, ColumnDriftResult>) -> Self {
        let status = columns.values().all(|c| !c.drift_status);
        Self {
            threshold,
            status,
            columns,
        }
    }

    pub fn drifted_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.drift_status)
            .map(|(name, _)| name.as_str())
    }

    pub fn skipped_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, c)| !c.is_evaluated())
            .map(|(name, _)| name.as_str())
    }
}

/// Runs a two-sample test per column and classifies each as drifted or not.
#[derive(Debug, Clone)]
pub struct DistributionDriftDetector {
    threshold: f64,
    categorical: CategoricalPolicy,
    parallel: bool,
    exact_max_product: u64,
}

impl Default for DistributionDriftDetector {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            categorical: CategoricalPolicy::default(),
            parallel: false,
            exact_max_product: DEFAULT_EXACT_MAX_PRODUCT,
        }
    }
}

impl DistributionDriftDetector {
    /// Detector with the given threshold, which must lie strictly between 0 and 1.
    pub fn new(threshold: f64) -> Result<Self> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(ValidationError::new(
                "create_drift_detector",
                ErrorKind::config(format!("drift threshold must be in (0, 1), got {threshold}")),
            ));
        }
        Ok(Self {
            threshold,
            ..Self::default()
        })
    }

    pub fn from_config(config: &DriftConfig) -> Result<Self> {
        Ok(Self::new(config.threshold)?
            .with_categorical(config.categorical)
            .with_parallel(config.parallel)
            .with_exact_max_product(config.exact_max_product))
    }

    pub fn with_categorical(mut self, policy: CategoricalPolicy) -> Self {
        self.categorical = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_exact_max_product(mut self, product: u64) -> Self {
        self.exact_max_product = product;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Compare every baseline column that also exists in `candidate`.
    pub fn compute(&self, baseline: &Dataset, candidate: &Dataset) -> DriftReport {
        let pairs: Vec<(Column<'_>, Option<Column<'_>>)> = baseline
            .columns()
            .map(|col| (col, candidate.column(col.name())))
            .collect();

        let results: Vec<Option<ColumnDriftResult>> = if self.parallel {
            pairs
                .par_iter()
                .map(|(base, cand)| cand.map(|cand| self.evaluate(*base, cand)))
                .collect()
        } else {
            pairs
                .iter()
                .map(|(base, cand)| cand.map(|cand| self.evaluate(*base, cand)))
                .collect()
        };

        let mut columns = IndexMap::with_capacity(results.len());
        for ((base, _), result) in pairs.iter().zip(results) {
            match result {
                Some(result) => {
                    columns.insert(base.name().to_string(), result);
                }
                None => tracing::warn!(
                    column = base.name(),
                    "Column missing from candidate dataset, not compared"
                ),
            }
        }

        let report = DriftReport::new(self.threshold, columns);
        tracing::info!(
            columns = report.columns.len(),
            drifted = report.drifted_columns().count(),
            skipped = report.skipped_columns().count(),
            status = report.status,
            "Drift detection finished"
        );
        report
    }

    /// Compute the report and write it to `report_path`.
    pub fn detect(
        &self,
        baseline: &Dataset,
        candidate: &Dataset,
        report_path: &Path,
    ) -> Result<DriftReport> {
        let report = self.compute(baseline, candidate);
        write_report(report_path, &report)?;
        Ok(report)
    }

    fn evaluate(&self, baseline: Column<'_>, candidate: Column<'_>) -> ColumnDriftResult {
        match self.test_column(baseline, candidate) {
            Ok(outcome) => {
                let result = ColumnDriftResult::evaluated(outcome, self.threshold);
                tracing::debug!(
                    column = baseline.name(),
                    p_value = outcome.p_value,
                    statistic = outcome.statistic,
                    drift = result.drift_status,
                    "Column tested"
                );
                result
            }
            Err(e) => {
                tracing::warn!(column = baseline.name(), reason = %e, "Column not evaluated");
                ColumnDriftResult::not_evaluated(e.to_string())
            }
        }
    }

    fn test_column(
        &self,
        baseline: Column<'_>,
        candidate: Column<'_>,
    ) -> std::result::Result<TestOutcome, StatsError> {
        match (baseline.values(), candidate.values()) {
            (ColumnValues::Empty, _) => Err(StatsError::EmptySample("baseline")),
            (_, ColumnValues::Empty) => Err(StatsError::EmptySample("candidate")),
            (ColumnValues::Numeric(a), ColumnValues::Numeric(b)) => {
                ks_two_sample(&a, &b, self.exact_max_product)
            }
            (ColumnValues::Categorical(a), ColumnValues::Categorical(b)) => match self.categorical {
                CategoricalPolicy::ChiSquare => chi_square_two_sample(&a, &b),
                CategoricalPolicy::Skip => Err(StatsError::Unsupported(
                    "categorical column skipped by policy".to_string(),
                )),
            },
            _ => Err(StatsError::TypeMismatch {
                baseline: format!("{:?}", baseline.dtype()).to_lowercase(),
                candidate: format!("{:?}", candidate.dtype()).to_lowercase(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dataset(columns: &[(&str, Vec<String>)]) -> Dataset {
        let rows = columns[0].1.len();
        Dataset::from_rows(
            "mem.csv",
            columns.iter().map(|(n, _)| n.to_string()).collect(),
            (0..rows)
                .map(|r| columns.iter().map(|(_, v)| v[r].clone()).collect())
                .collect(),
        )
    }

    fn nums(values: impl IntoIterator<Item = f64>) -> Vec<String> {
        values.into_iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_identical_column_no_drift() {
        let base = dataset(&[("x", nums([1.0, 2.0, 3.0, 4.0, 5.0]))]);
        let report = DistributionDriftDetector::default().compute(&base, &base.clone());

        let x = &report.columns["x"];
        assert_eq!(x.p_value, Some(1.0));
        assert!(!x.drift_status);
        assert!(report.status);
    }

    #[test]
    fn test_disjoint_column_drifts() {
        let base = dataset(&[("x", nums(vec![0.0; 100]))]);
        let cand = dataset(&[("x", nums(vec![100.0; 100]))]);
        let report = DistributionDriftDetector::default().compute(&base, &cand);

        let x = &report.columns["x"];
        assert!(x.p_value.unwrap() < 1e-10);
        assert!(x.drift_status);
        assert!(!report.status);
        assert_eq!(report.drifted_columns().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn test_threshold_boundary_is_not_drift() {
        let outcome = TestOutcome {
            kind: TestKind::KolmogorovSmirnov,
            statistic: 0.3,
            p_value: 0.05,
        };
        assert!(!ColumnDriftResult::evaluated(outcome, 0.05).drift_status);
        let below = TestOutcome {
            p_value: 0.049_999,
            ..outcome
        };
        assert!(ColumnDriftResult::evaluated(below, 0.05).drift_status);
    }

    #[test]
    fn test_report_keeps_baseline_order_and_common_columns() {
        let base = dataset(&[
            ("c", nums([1.0, 2.0])),
            ("a", nums([1.0, 2.0])),
            ("only_base", nums([1.0, 2.0])),
            ("b", nums([1.0, 2.0])),
        ]);
        let cand = dataset(&[
            ("b", nums([1.0, 2.0])),
            ("a", nums([1.0, 2.0])),
            ("c", nums([1.0, 2.0])),
            ("only_cand", nums([1.0, 2.0])),
        ]);
        let detector = DistributionDriftDetector::default();
        let sequential = detector.compute(&base, &cand);
        let parallel = detector.clone().with_parallel(true).compute(&base, &cand);

        assert_eq!(
            sequential.columns.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["c", "a", "b"]
        );
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_categorical_column_uses_chi_square() {
        let labels = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let base = dataset(&[("city", labels(&["a", "b", "a", "b"]))]);
        let cand = dataset(&[("city", labels(&["b", "a", "b", "a"]))]);

        let report = DistributionDriftDetector::default().compute(&base, &cand);
        assert_eq!(report.columns["city"].test, Some(TestKind::ChiSquare));
        assert_eq!(report.columns["city"].p_value, Some(1.0));

        let skipped = DistributionDriftDetector::default()
            .with_categorical(CategoricalPolicy::Skip)
            .compute(&base, &cand);
        assert!(!skipped.columns["city"].is_evaluated());
        assert!(skipped.status);
    }

    #[test]
    fn test_type_mismatch_is_marked_not_fatal() {
        let base = dataset(&[
            ("x", nums([1.0, 2.0, 3.0, 4.0, 5.0, 6.0])),
            ("y", nums([0.0; 6])),
        ]);
        let cand = dataset(&[
            ("x", ["p", "q", "r", "s", "t", "u"].iter().map(|s| s.to_string()).collect()),
            ("y", nums([50.0; 6])),
        ]);
        let report = DistributionDriftDetector::default().compute(&base, &cand);

        let x = &report.columns["x"];
        assert_eq!(x.p_value, None);
        assert!(!x.drift_status);
        assert!(x.not_evaluated.as_deref().unwrap().contains("type mismatch"));
        assert_eq!(report.skipped_columns().collect::<Vec<_>>(), vec!["x"]);
        assert!(report.columns["y"].drift_status);
    }

    #[test]
    fn test_empty_column_not_evaluated() {
        let base = dataset(&[("x", vec!["na".into(), "".into()])]);
        let cand = dataset(&[("x", nums([1.0, 2.0]))]);
        let report = DistributionDriftDetector::default().compute(&base, &cand);
        assert!(!report.columns["x"].is_evaluated());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        assert!(DistributionDriftDetector::new(0.0).is_err());
        assert!(DistributionDriftDetector::new(1.0).is_err());
        assert!(DistributionDriftDetector::new(f64::NAN).is_err());
        assert!(DistributionDriftDetector::new(0.01).is_ok());
    }

    #[test]
    fn test_detect_writes_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("drift_report").join("report.yaml");
        let base = dataset(&[("x", nums([1.0, 2.0, 3.0]))]);

        let report = DistributionDriftDetector::default()
            .detect(&base, &base.clone(), &path)
            .unwrap();
        assert!(path.exists());
        assert_eq!(crate::validate::report::read_report(&path).unwrap(), report);
    }
}
