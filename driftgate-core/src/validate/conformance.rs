//! Schema conformance checks for a loaded dataset.

use crate::data::dataset::{Dataset, DatasetRole};
use crate::data::schema::{ColumnType, SchemaDefinition};
use serde::{Deserialize, Serialize};

/// How strictly a dataset is compared against the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConformancePolicy {
    /// Only the number of columns must match.
    #[default]
    ColumnCount,
    /// Column count, column names and declared types must all match.
    Strict,
}

/// A declared column whose observed type does not satisfy the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMismatch {
    pub column: String,
    pub expected_type: ColumnType,
    pub actual_type: ColumnType,
}

/// Detailed result of a conformance check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConformanceOutcome {
    pub passed: bool,
    pub expected_columns: usize,
    pub actual_columns: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unexpected_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_mismatches: Vec<TypeMismatch>,
}

impl ConformanceOutcome {
    /// Human readable description of why the check failed, attributed to `role`.
    pub fn describe(&self, role: DatasetRole) -> String {
        let mut parts = Vec::new();
        if self.expected_columns != self.actual_columns {
            parts.push(format!(
                "expected {} columns, found {}",
                self.expected_columns, self.actual_columns
            ));
        }
        if !self.missing_columns.is_empty() {
            parts.push(format!("missing columns: {}", self.missing_columns.join(", ")));
        }
        if !self.unexpected_columns.is_empty() {
            parts.push(format!(
                "unexpected columns: {}",
                self.unexpected_columns.join(", ")
            ));
        }
        for m in &self.type_mismatches {
            parts.push(format!(
                "column '{}' expected {:?}, found {:?}",
                m.column, m.expected_type, m.actual_type
            ));
        }
        if parts.is_empty() {
            format!("{role} dataset conforms to the schema")
        } else {
            format!("{role} dataset does not conform to the schema: {}", parts.join("; "))
        }
    }
}

/// A failed conformance check, kept per dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaFailure {
    pub dataset: DatasetRole,
    pub message: String,
    pub outcome: ConformanceOutcome,
}

/// Compares a dataset's column structure against a schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaConformanceChecker {
    policy: ConformancePolicy,
}

impl SchemaConformanceChecker {
    pub fn new(policy: ConformancePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ConformancePolicy {
        self.policy
    }

    /// Whether `dataset` conforms to `schema` under the configured policy.
    pub fn check(&self, dataset: &Dataset, schema: &SchemaDefinition) -> bool {
        self.inspect(dataset, schema).passed
    }

    /// Run the check and return every detail it found.
    pub fn inspect(&self, dataset: &Dataset, schema: &SchemaDefinition) -> ConformanceOutcome {
        let expected_columns = schema.len();
        let actual_columns = dataset.column_count();
        tracing::info!(
            required = expected_columns,
            actual = actual_columns,
            source = %dataset.source().display(),
            "Checking number of columns"
        );

        let mut outcome = ConformanceOutcome {
            passed: expected_columns == actual_columns,
            expected_columns,
            actual_columns,
            missing_columns: Vec::new(),
            unexpected_columns: Vec::new(),
            type_mismatches: Vec::new(),
        };

        if self.policy == ConformancePolicy::Strict {
            outcome.missing_columns = schema
                .names()
                .filter(|name| dataset.column(name).is_none())
                .map(str::to_string)
                .collect();
            outcome.unexpected_columns = dataset
                .column_names()
                .iter()
                .filter(|name| schema.column(name).is_none())
                .cloned()
                .collect();
            outcome.type_mismatches = schema
                .columns
                .iter()
                .filter_map(|declared| {
                    let column = dataset.column(&declared.name)?;
                    let actual = column.dtype();
                    (!declared.dtype.accepts(actual)).then(|| TypeMismatch {
                        column: declared.name.clone(),
                        expected_type: declared.dtype,
                        actual_type: actual,
                    })
                })
                .collect();
            // Declared numerical features must have been read as numbers.
            for name in &schema.numerical_columns {
                let Some(column) = dataset.column(name) else {
                    continue;
                };
                let actual = column.dtype();
                let reported = outcome.type_mismatches.iter().any(|m| &m.column == name);
                if !actual.is_numeric() && actual != ColumnType::Null && !reported {
                    outcome.type_mismatches.push(TypeMismatch {
                        column: name.clone(),
                        expected_type: ColumnType::Float,
                        actual_type: actual,
                    });
                }
            }
            outcome.passed = outcome.passed
                && outcome.missing_columns.is_empty()
                && outcome.unexpected_columns.is_empty()
                && outcome.type_mismatches.is_empty();
        }

        outcome
    }
}
