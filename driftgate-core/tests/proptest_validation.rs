//! Property-based tests for validation components using proptest.

use driftgate_core::data::{ColumnType, Dataset, SchemaDefinition};
use driftgate_core::validate::stats::{TestKind, TestOutcome};
use driftgate_core::validate::{
    ColumnDriftResult, DistributionDriftDetector, DriftReport, SchemaConformanceChecker,
    read_report, write_report,
};
use indexmap::IndexMap;
use proptest::prelude::*;
use tempfile::TempDir;

fn dataset_with_columns(n: usize) -> Dataset {
    Dataset::from_rows(
        "mem.csv",
        (0..n).map(|i| format!("c{i}")).collect(),
        vec![(0..n).map(|i| i.to_string()).collect()],
    )
}

fn schema_with_columns(n: usize) -> SchemaDefinition {
    SchemaDefinition::new((0..n).map(|i| (format!("s{i}"), ColumnType::Integer))).unwrap()
}

fn column_result() -> impl Strategy<Value = ColumnDriftResult> {
    prop_oneof![
        (0.0f64..=1.0, 0.0f64..=1.0, 0.001f64..0.5).prop_map(|(p, d, threshold)| {
            ColumnDriftResult::evaluated(
                TestOutcome {
                    kind: TestKind::KolmogorovSmirnov,
                    statistic: d,
                    p_value: p,
                },
                threshold,
            )
        }),
        "[a-z ]{1,20}".prop_map(ColumnDriftResult::not_evaluated),
    ]
}

fn drift_report() -> impl Strategy<Value = DriftReport> {
    (
        0.001f64..0.5,
        prop::collection::vec(("[a-zA-Z_][a-zA-Z0-9_]{0,12}", column_result()), 0..12),
    )
        .prop_map(|(threshold, entries)| {
            let columns: IndexMap<String, ColumnDriftResult> = entries.into_iter().collect();
            DriftReport::new(threshold, columns)
        })
}

// --- Conformance properties ---

proptest! {
    #[test]
    fn conformance_matches_column_count(columns in 1usize..40, entries in 1usize..40) {
        let checker = SchemaConformanceChecker::default();
        let passed = checker.check(&dataset_with_columns(columns), &schema_with_columns(entries));
        prop_assert_eq!(passed, columns == entries);
    }
}

// --- Drift report properties ---

proptest! {
    #[test]
    fn status_is_and_of_not_drifted(report in drift_report()) {
        let expected = report.columns.values().all(|c| !c.drift_status);
        prop_assert_eq!(report.status, expected);
    }

    #[test]
    fn drift_flag_is_strict_less_than(p in 0.0f64..=1.0, threshold in 0.001f64..0.999) {
        let result = ColumnDriftResult::evaluated(
            TestOutcome { kind: TestKind::KolmogorovSmirnov, statistic: 0.5, p_value: p },
            threshold,
        );
        prop_assert_eq!(result.drift_status, p < threshold);
    }

    #[test]
    fn report_round_trips_and_rewrites_identically(report in drift_report()) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("drift_report").join("report.yaml");

        write_report(&path, &report).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        prop_assert_eq!(&read_report(&path).unwrap(), &report);

        write_report(&path, &report).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn identical_numeric_columns_never_drift(values in prop::collection::vec(-1e6f64..1e6, 1..60)) {
        let rows: Vec<Vec<String>> = values.iter().map(|v| vec![format!("{v}")]).collect();
        let ds = Dataset::from_rows("mem.csv", vec!["x".to_string()], rows);
        let report = DistributionDriftDetector::default().compute(&ds, &ds);
        let x = &report.columns["x"];
        prop_assert_eq!(x.p_value, Some(1.0));
        prop_assert!(!x.drift_status);
    }
}
