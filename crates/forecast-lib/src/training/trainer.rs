//! Offline training pipeline
//!
//! load → clean → per-device IQR filter → features → chronological split →
//! standardize → least squares → evaluate

use super::cleaning::{filter_outliers, group_by_device};
use super::linear::{EvaluationMetrics, LinearModel};
use super::loader::{load_any, LogFormat};
use super::scaler::StandardScaler;
use crate::artifact::{ArtifactMetadata, ModelArtifact, ARTIFACT_FORMAT_VERSION};
use crate::error::{ForecastError, Result};
use crate::features::{FeatureRecipe, LabeledRow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Default structured log path
pub const DEFAULT_LOG_PATH: &str = "heart_rate_log.csv";

/// Default legacy free-text log path
pub const DEFAULT_LEGACY_LOG_PATH: &str = "heart_rate_log.txt";

/// Configuration for a training run
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub log_path: PathBuf,
    pub legacy_log_path: PathBuf,
    pub recipe: FeatureRecipe,
    /// Share of the most recent rows held out for evaluation
    pub test_fraction: f64,
    /// Recorded for provenance; no fitting step is stochastic
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            legacy_log_path: PathBuf::from(DEFAULT_LEGACY_LOG_PATH),
            recipe: FeatureRecipe::default(),
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        FeatureRecipe::new(self.recipe.max_lag, self.recipe.roll_window)?;
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        Ok(())
    }
}

/// Rows dropped at each cleaning stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub format: Option<LogFormat>,
    pub lines_read: usize,
    /// Lines that did not parse into a reading
    pub malformed: usize,
    /// Readings outside their device's IQR fences
    pub outliers: usize,
    /// Readings without full lag history or a successor
    pub unlabelled: usize,
    /// Labelled rows that reached the split
    pub rows: usize,
    pub devices: usize,
}

/// Batch trainer producing a [`ModelArtifact`]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Run the full pipeline over the configured log
    pub fn train(&self) -> Result<ModelArtifact> {
        let recipe = self.config.recipe;
        let loaded = load_any(&self.config.log_path, &self.config.legacy_log_path)?;

        let mut report = CleaningReport {
            format: Some(loaded.format),
            lines_read: loaded.lines_read,
            malformed: loaded.malformed,
            ..Default::default()
        };
        let source = loaded.source;

        let (kept, outliers) = filter_outliers(loaded.readings);
        report.outliers = outliers;

        let groups = group_by_device(kept);
        report.devices = groups.len();

        let mut rows: Vec<LabeledRow> = Vec::new();
        for (device, series) in &groups {
            let derived = recipe.derive_series(series);
            report.unlabelled += series.len() - derived.len();
            if derived.is_empty() {
                warn!(
                    device = %device,
                    readings = series.len(),
                    needed = recipe.full_lag_history() + 1,
                    "Device has too few readings to contribute training rows"
                );
            }
            rows.extend(derived);
        }
        report.rows = rows.len();

        info!(
            lines = report.lines_read,
            malformed = report.malformed,
            outliers = report.outliers,
            unlabelled = report.unlabelled,
            rows = report.rows,
            devices = report.devices,
            "Training data prepared"
        );

        if rows.is_empty() {
            return Err(ForecastError::InsufficientData(format!(
                "no labelled rows after cleaning (each device needs at least {} readings)",
                recipe.full_lag_history() + 1
            )));
        }

        let (train, test) = chronological_split(rows, self.config.test_fraction);
        if train.is_empty() {
            return Err(ForecastError::InsufficientData(format!(
                "training partition is empty ({} rows, test_fraction {})",
                test.len(),
                self.config.test_fraction
            )));
        }

        let (x_train, y_train) = to_matrix(&train);
        let scaler = StandardScaler::fit(&x_train)?;
        let model = LinearModel::fit(&scaler.transform_all(&x_train), &y_train)?;

        let (x_test, y_test) = to_matrix(&test);
        let predicted = model.predict_all(&scaler.transform_all(&x_test));
        let metrics = EvaluationMetrics::compute(&predicted, &y_test);
        match &metrics {
            Some(m) => info!(
                r2 = m.r2,
                mae = m.mae,
                n_train = train.len(),
                n_test = test.len(),
                "Model evaluated on held-out rows"
            ),
            None => warn!(n_train = train.len(), "No held-out rows, metrics unavailable"),
        }

        Ok(ModelArtifact {
            scaler,
            model,
            metadata: ArtifactMetadata {
                format_version: ARTIFACT_FORMAT_VERSION,
                feature_cols: recipe.column_names(),
                max_lag: recipe.max_lag,
                roll_window: recipe.roll_window,
                metrics,
                n_train: train.len(),
                n_test: test.len(),
                test_fraction: self.config.test_fraction,
                seed: self.config.seed,
                trained_at: Utc::now(),
                source,
                cleaning: report,
                checksums: None,
            },
        })
    }
}

/// Sort by timestamp and cut; the first `floor(n · (1 − test_fraction))`
/// rows train, the rest evaluate. Never shuffles.
pub fn chronological_split(
    mut rows: Vec<LabeledRow>,
    test_fraction: f64,
) -> (Vec<LabeledRow>, Vec<LabeledRow>) {
    rows.sort_by_key(|r| r.timestamp);
    let cut = ((rows.len() as f64) * (1.0 - test_fraction)).floor() as usize;
    let test = rows.split_off(cut.min(rows.len()));
    (rows, test)
}

fn to_matrix(rows: &[LabeledRow]) -> (Vec<Vec<f64>>, Vec<f64>) {
    rows.iter()
        .map(|r| (r.features.as_slice().to_vec(), r.label))
        .unzip()
}
