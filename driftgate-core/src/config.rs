//! Configuration for a validation run.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! explicit config file -> environment -> caller overrides. The user-level file
//! lives at `~/.config/driftgate/config.toml`; environment variables use the
//! `DRIFTGATE_` prefix with `__` separating nested keys
//! (`DRIFTGATE_DRIFT__THRESHOLD=0.01`).

use crate::error::{ErrorKind, Result, ValidationError};
use crate::validate::conformance::ConformancePolicy;
use crate::validate::drift::DEFAULT_THRESHOLD;
use crate::validate::stats::DEFAULT_EXACT_MAX_PRODUCT;
use chrono::{DateTime, Local};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Root directory for every output of the run.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Path of the YAML schema description.
    #[serde(default = "default_schema_path")]
    pub schema_path: PathBuf,
    /// Place outputs under a per-run timestamp directory.
    #[serde(default)]
    pub timestamped_runs: bool,
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            artifact_dir: default_artifact_dir(),
            schema_path: default_schema_path(),
            timestamped_runs: false,
            drift: DriftConfig::default(),
            schema: SchemaConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("data_schema").join("schema.yaml")
}

/// How categorical columns are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalPolicy {
    /// Chi-square test of homogeneity over category frequencies.
    #[default]
    ChiSquare,
    /// Mark categorical columns as not evaluated.
    Skip,
}

/// Drift detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Columns with a p-value strictly below this are flagged as drifted.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub categorical: CategoricalPolicy,
    /// Test columns on the rayon thread pool.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Use the exact KS p-value while `n1 * n2` stays at or below this.
    #[serde(default = "default_exact_max_product")]
    pub exact_max_product: u64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            categorical: CategoricalPolicy::default(),
            parallel: true,
            exact_max_product: default_exact_max_product(),
        }
    }
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_exact_max_product() -> u64 {
    DEFAULT_EXACT_MAX_PRODUCT
}

fn default_true() -> bool {
    true
}

/// Schema conformance settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub policy: ConformancePolicy,
    /// Let a schema failure turn the final validation status false.
    #[serde(default)]
    pub affects_status: bool,
}

/// Output layout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Also copy failing datasets into the `invalid/` directory.
    #[serde(default)]
    pub quarantine_invalid: bool,
    #[serde(default = "default_report_file")]
    pub drift_report_file: String,
    #[serde(default = "default_train_file")]
    pub train_file: String,
    #[serde(default = "default_test_file")]
    pub test_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            quarantine_invalid: false,
            drift_report_file: default_report_file(),
            train_file: default_train_file(),
            test_file: default_test_file(),
        }
    }
}

fn default_report_file() -> String {
    "report.yaml".to_string()
}

fn default_train_file() -> String {
    "train.csv".to_string()
}

fn default_test_file() -> String {
    "test.csv".to_string()
}

/// Concrete output locations for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPaths {
    pub root: PathBuf,
    pub valid_train_file_path: PathBuf,
    pub valid_test_file_path: PathBuf,
    pub invalid_train_file_path: PathBuf,
    pub invalid_test_file_path: PathBuf,
    pub drift_report_file_path: PathBuf,
    pub artifact_file_path: PathBuf,
}

/// Directory name format used for timestamped runs.
pub const RUN_TIMESTAMP_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

impl ValidationConfig {
    /// Reject settings no run could use.
    pub fn validate(&self) -> Result<()> {
        let t = self.drift.threshold;
        if !(t > 0.0 && t < 1.0) {
            return Err(ValidationError::new(
                "validate_config",
                ErrorKind::config(format!("drift.threshold must be in (0, 1), got {t}")),
            ));
        }
        for (key, name) in [
            ("output.drift_report_file", &self.output.drift_report_file),
            ("output.train_file", &self.output.train_file),
            ("output.test_file", &self.output.test_file),
        ] {
            if name.trim().is_empty() {
                return Err(ValidationError::new(
                    "validate_config",
                    ErrorKind::config(format!("{key} must not be empty")),
                ));
            }
        }
        Ok(())
    }

    /// Resolve output paths for a run started at `started_at`.
    pub fn paths_at(&self, started_at: DateTime<Local>) -> ValidationPaths {
        let mut root = self.artifact_dir.clone();
        if self.timestamped_runs {
            root.push(started_at.format(RUN_TIMESTAMP_FORMAT).to_string());
        }
        let root = root.join("data_validation");
        let valid = root.join("validated");
        let invalid = root.join("invalid");
        ValidationPaths {
            valid_train_file_path: valid.join(&self.output.train_file),
            valid_test_file_path: valid.join(&self.output.test_file),
            invalid_train_file_path: invalid.join(&self.output.train_file),
            invalid_test_file_path: invalid.join(&self.output.test_file),
            drift_report_file_path: root
                .join("drift_report")
                .join(&self.output.drift_report_file),
            artifact_file_path: root.join("artifact.json"),
            root,
        }
    }

    /// Resolve output paths for a run starting now.
    pub fn paths(&self) -> ValidationPaths {
        self.paths_at(Local::now())
    }
}

/// Caller-supplied values that take precedence over every other layer.
///
/// Only fields that are set are merged; unset fields leave the lower layers intact.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "DriftOverrides::is_empty")]
    pub drift: DriftOverrides,
    #[serde(skip_serializing_if = "SchemaOverrides::is_empty")]
    pub schema: SchemaOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DriftOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl DriftOverrides {
    fn is_empty(&self) -> bool {
        self.threshold.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<ConformancePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affects_status: Option<bool>,
}

impl SchemaOverrides {
    fn is_empty(&self) -> bool {
        self.policy.is_none() && self.affects_status.is_none()
    }
}

/// Load configuration from all layers.
pub fn load_config(
    config_file: Option<&Path>,
    overrides: Option<&ConfigOverrides>,
) -> std::result::Result<ValidationConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(ValidationConfig::default()));

    // User-level config
    if let Some(config_dir) = directories::ProjectDirs::from("dev", "driftgate", "driftgate") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Explicit config file
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file_exact(path));
    }

    // Environment variables (DRIFTGATE_DRIFT__THRESHOLD, DRIFTGATE_SCHEMA__POLICY, etc.)
    figment = figment.merge(Env::prefixed("DRIFTGATE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = ValidationConfig::default();
        assert_eq!(config.drift.threshold, 0.05);
        assert_eq!(config.schema.policy, ConformancePolicy::ColumnCount);
        assert!(!config.schema.affects_status);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = ValidationConfig::default();
        config.drift.threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("drift.threshold"));
    }

    #[test]
    fn test_paths_layout() {
        let config = ValidationConfig {
            artifact_dir: PathBuf::from("out"),
            ..ValidationConfig::default()
        };
        let paths = config.paths();
        assert_eq!(
            paths.valid_train_file_path,
            PathBuf::from("out/data_validation/validated/train.csv")
        );
        assert_eq!(
            paths.invalid_test_file_path,
            PathBuf::from("out/data_validation/invalid/test.csv")
        );
        assert_eq!(
            paths.drift_report_file_path,
            PathBuf::from("out/data_validation/drift_report/report.yaml")
        );
    }

    #[test]
    fn test_timestamped_paths() {
        let config = ValidationConfig {
            artifact_dir: PathBuf::from("out"),
            timestamped_runs: true,
            ..ValidationConfig::default()
        };
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            config.paths_at(at).root,
            PathBuf::from("out/03_09_2024_14_05_07/data_validation")
        );
    }

    #[test]
    fn test_load_config_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "driftgate.toml",
                r#"
                artifact_dir = "runs"

                [drift]
                threshold = 0.01
                categorical = "skip"

                [schema]
                policy = "strict"
                "#,
            )?;
            jail.set_env("DRIFTGATE_SCHEMA__AFFECTS_STATUS", "true");

            let config = load_config(Some(Path::new("driftgate.toml")), None)
                .map_err(|e| e.to_string())?;
            assert_eq!(config.artifact_dir, PathBuf::from("runs"));
            assert_eq!(config.drift.threshold, 0.01);
            assert_eq!(config.drift.categorical, CategoricalPolicy::Skip);
            assert_eq!(config.schema.policy, ConformancePolicy::Strict);
            assert!(config.schema.affects_status);
            assert!(config.drift.parallel);
            Ok(())
        });
    }

    #[test]
    fn test_overrides_win() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("driftgate.toml", "[drift]\nthreshold = 0.01\n")?;
            jail.set_env("DRIFTGATE_DRIFT__THRESHOLD", "0.2");
            let overrides = ConfigOverrides {
                schema_path: Some(PathBuf::from("custom/schema.yaml")),
                ..ConfigOverrides::default()
            };
            let config = load_config(Some(Path::new("driftgate.toml")), Some(&overrides))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.schema_path, PathBuf::from("custom/schema.yaml"));
            assert_eq!(config.drift.threshold, 0.2);
            Ok(())
        });
    }

    #[test]
    fn test_unset_overrides_keep_lower_layers() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "driftgate.toml",
                "artifact_dir = \"runs\"\n\n[drift]\nthreshold = 0.01\n",
            )?;
            jail.set_env("DRIFTGATE_SCHEMA__AFFECTS_STATUS", "true");
            let overrides = ConfigOverrides {
                schema_path: Some(PathBuf::from("custom/schema.yaml")),
                schema: SchemaOverrides {
                    policy: Some(ConformancePolicy::Strict),
                    ..SchemaOverrides::default()
                },
                ..ConfigOverrides::default()
            };
            let config = load_config(Some(Path::new("driftgate.toml")), Some(&overrides))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.drift.threshold, 0.01);
            assert_eq!(config.artifact_dir, PathBuf::from("runs"));
            assert!(config.schema.affects_status);
            assert_eq!(config.schema.policy, ConformancePolicy::Strict);
            assert_eq!(config.schema_path, PathBuf::from("custom/schema.yaml"));
            Ok(())
        });
    }

    #[test]
    fn test_set_overrides_beat_env_and_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("driftgate.toml", "[drift]\nthreshold = 0.01\n")?;
            jail.set_env("DRIFTGATE_ARTIFACT_DIR", "env_runs");
            let overrides = ConfigOverrides {
                artifact_dir: Some(PathBuf::from("cli_runs")),
                drift: DriftOverrides {
                    threshold: Some(0.001),
                },
                ..ConfigOverrides::default()
            };
            let config = load_config(Some(Path::new("driftgate.toml")), Some(&overrides))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.artifact_dir, PathBuf::from("cli_runs"));
            assert_eq!(config.drift.threshold, 0.001);
            Ok(())
        });
    }
}
