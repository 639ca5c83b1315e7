//! Model artifact persistence
//!
//! An artifact is a directory holding three files written and loaded as a
//! set:
//! - `model.json`: fitted regression coefficients
//! - `scaler.json`: fitted standardization parameters
//! - `metadata.json`: feature shape, evaluation metrics, provenance and the
//!   SHA-256 checksums of the other two files
//!
//! Files are written to a temp path and renamed into place.

use crate::error::{ForecastError, Result};
use crate::features::{FeatureRecipe, FeatureVector};
use crate::training::{CleaningReport, EvaluationMetrics, LinearModel, StandardScaler};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Layout version of the artifact directory
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// SHA-256 digests of the model and scaler files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactChecksums {
    pub model: String,
    pub scaler: String,
}

/// Everything needed to reproduce and judge the model's inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub format_version: u32,
    pub feature_cols: Vec<String>,
    pub max_lag: usize,
    pub roll_window: usize,
    pub metrics: Option<EvaluationMetrics>,
    pub n_train: usize,
    pub n_test: usize,
    pub test_fraction: f64,
    pub seed: u64,
    pub trained_at: DateTime<Utc>,
    pub source: PathBuf,
    pub cleaning: CleaningReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksums: Option<ArtifactChecksums>,
}

/// Fitted model, scaler and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    pub scaler: StandardScaler,
    pub model: LinearModel,
    pub metadata: ArtifactMetadata,
}

impl ModelArtifact {
    /// The recipe this artifact was trained with
    pub fn recipe(&self) -> FeatureRecipe {
        FeatureRecipe {
            max_lag: self.metadata.max_lag,
            roll_window: self.metadata.roll_window,
        }
    }

    /// Refuse to score features built by a different recipe
    pub fn ensure_compatible(&self, recipe: &FeatureRecipe) -> Result<()> {
        if self.metadata.max_lag != recipe.max_lag {
            return Err(ForecastError::ConfigurationMismatch {
                field: "max_lag",
                artifact: self.metadata.max_lag.to_string(),
                runtime: recipe.max_lag.to_string(),
            });
        }
        if self.metadata.roll_window != recipe.roll_window {
            return Err(ForecastError::ConfigurationMismatch {
                field: "roll_window",
                artifact: self.metadata.roll_window.to_string(),
                runtime: recipe.roll_window.to_string(),
            });
        }
        let runtime_cols = recipe.column_names();
        if self.metadata.feature_cols != runtime_cols {
            return Err(ForecastError::ConfigurationMismatch {
                field: "feature_cols",
                artifact: self.metadata.feature_cols.join(","),
                runtime: runtime_cols.join(","),
            });
        }
        Ok(())
    }

    /// Standardize then apply the regression
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let z = self.scaler.transform(features.as_slice());
        self.model.predict(&z)
    }

    /// Write the three artifact files into `dir`, creating it if needed.
    ///
    /// Returns the checksums recorded in the written metadata.
    pub fn save(&self, dir: &Path) -> Result<ArtifactChecksums> {
        fs::create_dir_all(dir)?;

        let model_bytes = serde_json::to_vec_pretty(&self.model)?;
        let scaler_bytes = serde_json::to_vec_pretty(&self.scaler)?;
        let checksums = ArtifactChecksums {
            model: compute_checksum(&model_bytes),
            scaler: compute_checksum(&scaler_bytes),
        };

        let mut metadata = self.metadata.clone();
        metadata.checksums = Some(checksums.clone());
        let metadata_bytes = serde_json::to_vec_pretty(&metadata)?;

        write_atomic(&dir.join(MODEL_FILE), &model_bytes)?;
        write_atomic(&dir.join(SCALER_FILE), &scaler_bytes)?;
        write_atomic(&dir.join(METADATA_FILE), &metadata_bytes)?;

        info!(
            dir = %dir.display(),
            model_checksum = %checksums.model,
            scaler_checksum = %checksums.scaler,
            "Model artifact saved"
        );

        Ok(checksums)
    }

    /// Load and verify an artifact directory
    pub fn load(dir: &Path) -> Result<Self> {
        let metadata_path = dir.join(METADATA_FILE);
        let model_path = dir.join(MODEL_FILE);
        let scaler_path = dir.join(SCALER_FILE);

        let missing: Vec<PathBuf> = [&metadata_path, &model_path, &scaler_path]
            .into_iter()
            .filter(|p| !p.exists())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(ForecastError::SourceNotFound(missing));
        }

        let metadata: ArtifactMetadata = read_json(&metadata_path)?;
        if metadata.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(artifact_error(
                &metadata_path,
                format!(
                    "unsupported format_version {} (expected {})",
                    metadata.format_version, ARTIFACT_FORMAT_VERSION
                ),
            ));
        }

        let model_bytes = fs::read(&model_path)?;
        let scaler_bytes = fs::read(&scaler_path)?;
        if let Some(expected) = &metadata.checksums {
            verify_checksum(&model_path, &model_bytes, &expected.model)?;
            verify_checksum(&scaler_path, &scaler_bytes, &expected.scaler)?;
        }

        let model: LinearModel = parse_json(&model_path, &model_bytes)?;
        let scaler: StandardScaler = parse_json(&scaler_path, &scaler_bytes)?;

        let artifact = Self {
            scaler,
            model,
            metadata,
        };
        artifact.validate_shape(dir)?;

        debug!(
            dir = %dir.display(),
            features = artifact.metadata.feature_cols.len(),
            "Model artifact loaded"
        );

        Ok(artifact)
    }

    /// Every part must agree on the feature width
    fn validate_shape(&self, dir: &Path) -> Result<()> {
        let cols = self.metadata.feature_cols.len();
        let expected = self.recipe().width();
        let widths = [
            ("feature_cols", cols),
            ("model coefficients", self.model.width()),
            ("scaler mean", self.scaler.mean.len()),
            ("scaler scale", self.scaler.scale.len()),
        ];
        for (name, width) in widths {
            if width != expected {
                return Err(artifact_error(
                    dir,
                    format!(
                        "{} has width {}, max_lag {} implies {}",
                        name, width, self.metadata.max_lag, expected
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn verify_checksum(path: &Path, data: &[u8], expected: &str) -> Result<()> {
    let computed = compute_checksum(data);
    if computed != expected {
        return Err(artifact_error(
            path,
            format!("checksum mismatch: expected {}, got {}", expected, computed),
        ));
    }
    Ok(())
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path)?;
    parse_json(path, &bytes)
}

fn parse_json<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| artifact_error(path, e.to_string()))
}

fn artifact_error(path: &Path, reason: String) -> ForecastError {
    ForecastError::Artifact {
        path: path.to_path_buf(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_artifact(max_lag: usize, roll_window: usize) -> ModelArtifact {
        let recipe = FeatureRecipe::new(max_lag, roll_window).unwrap();
        let width = recipe.width();
        ModelArtifact {
            scaler: StandardScaler {
                mean: vec![1.0; width],
                scale: vec![2.0; width],
            },
            model: LinearModel {
                intercept: 75.0,
                coefficients: (0..width).map(|i| i as f64 * 0.1).collect(),
            },
            metadata: ArtifactMetadata {
                format_version: ARTIFACT_FORMAT_VERSION,
                feature_cols: recipe.column_names(),
                max_lag,
                roll_window,
                metrics: Some(EvaluationMetrics { r2: 0.9, mae: 1.5 }),
                n_train: 80,
                n_test: 20,
                test_fraction: 0.2,
                seed: 42,
                trained_at: Utc::now(),
                source: PathBuf::from("heart_rate_log.csv"),
                cleaning: CleaningReport::default(),
                checksums: None,
            },
        }
    }

    #[test]
    fn test_save_then_load_preserves_everything() {
        let dir = TempDir::new().unwrap();
        let artifact = sample_artifact(5, 10);

        let checksums = artifact.save(dir.path()).unwrap();
        let loaded = ModelArtifact::load(dir.path()).unwrap();

        assert_eq!(loaded.model, artifact.model);
        assert_eq!(loaded.scaler, artifact.scaler);
        assert_eq!(loaded.metadata.feature_cols, artifact.metadata.feature_cols);
        assert_eq!(loaded.metadata.checksums, Some(checksums));
        assert!(!dir.path().join("model.tmp").exists());
    }

    #[test]
    fn test_missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        sample_artifact(5, 10).save(dir.path()).unwrap();
        fs::remove_file(dir.path().join(SCALER_FILE)).unwrap();

        let err = ModelArtifact::load(dir.path()).unwrap_err();
        assert!(matches!(err, ForecastError::SourceNotFound(paths) if paths.len() == 1));
    }

    #[test]
    fn test_tampered_model_fails_checksum() {
        let dir = TempDir::new().unwrap();
        sample_artifact(5, 10).save(dir.path()).unwrap();

        let mut model: LinearModel = read_json(&dir.path().join(MODEL_FILE)).unwrap();
        model.intercept = 0.0;
        fs::write(
            dir.path().join(MODEL_FILE),
            serde_json::to_vec_pretty(&model).unwrap(),
        )
        .unwrap();

        let err = ModelArtifact::load(dir.path()).unwrap_err();
        match err {
            ForecastError::Artifact { reason, .. } => assert!(reason.contains("checksum")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inconsistent_width_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut artifact = sample_artifact(5, 10);
        artifact.model.coefficients.pop();
        artifact.save(dir.path()).unwrap();

        assert!(matches!(
            ModelArtifact::load(dir.path()),
            Err(ForecastError::Artifact { .. })
        ));
    }

    #[test]
    fn test_unsupported_format_version() {
        let dir = TempDir::new().unwrap();
        let mut artifact = sample_artifact(5, 10);
        artifact.metadata.format_version = 99;
        artifact.save(dir.path()).unwrap();

        let err = ModelArtifact::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("format_version"));
    }

    #[test]
    fn test_compatibility_check() {
        let artifact = sample_artifact(5, 10);
        assert!(artifact
            .ensure_compatible(&FeatureRecipe::new(5, 10).unwrap())
            .is_ok());

        let err = artifact
            .ensure_compatible(&FeatureRecipe::new(3, 10).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::ConfigurationMismatch { field: "max_lag", .. }
        ));

        let err = artifact
            .ensure_compatible(&FeatureRecipe::new(5, 20).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::ConfigurationMismatch { field: "roll_window", .. }
        ));
    }

    #[test]
    fn test_renamed_columns_are_a_mismatch() {
        let mut artifact = sample_artifact(2, 4);
        artifact.metadata.feature_cols[3] = "lag_one".to_string();
        let err = artifact
            .ensure_compatible(&FeatureRecipe::new(2, 4).unwrap())
            .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::ConfigurationMismatch { field: "feature_cols", .. }
        ));
    }

    #[test]
    fn test_predict_standardizes_first() {
        let artifact = ModelArtifact {
            scaler: StandardScaler {
                mean: vec![10.0],
                scale: vec![2.0],
            },
            model: LinearModel {
                intercept: 1.0,
                coefficients: vec![3.0],
            },
            metadata: sample_artifact(1, 1).metadata,
        };
        let features = FeatureVector::from(vec![14.0]);
        assert_eq!(artifact.predict(&features), 1.0 + 3.0 * 2.0);
    }
}
