//! Predictor daemon configuration
//!
//! Sources, later overriding earlier: built-in defaults, an optional file
//! named by `PULSE_CONFIG`, then `PULSE_*` environment variables.

use anyhow::{Context, Result};
use forecast_lib::features::FeatureRecipe;
use forecast_lib::predictor::{OutputFormat, PredictorConfig, RotationPolicy};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "PULSE";
const CONFIG_FILE_VAR: &str = "PULSE_CONFIG";

/// Predictor daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PredictorSettings {
    /// Structured log to tail
    pub log_path: PathBuf,
    /// Directory holding the trained artifact
    pub model_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub max_lag: usize,
    pub roll_window: usize,
    pub min_history: usize,
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub rotation_policy: RotationPolicy,
    pub output_format: OutputFormat,
    /// Port for health/metrics; 0 disables the endpoint
    pub api_port: u16,
}

impl PredictorSettings {
    /// Load configuration from the environment and optional config file
    pub fn load() -> Result<Self> {
        let file = std::env::var_os(CONFIG_FILE_VAR).map(PathBuf::from);
        Self::from_sources(file, config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_sources(file: Option<PathBuf>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("log_path", "heart_rate_log.csv")?
            .set_default("model_dir", "models")?
            .set_default("poll_interval_ms", 1000)?
            .set_default("max_lag", 5)?
            .set_default("roll_window", 10)?
            .set_default("min_history", 20)?
            .set_default("low_threshold", 60.0)?
            .set_default("high_threshold", 100.0)?
            .set_default("rotation_policy", "retain")?
            .set_default("output_format", "text")?
            .set_default("api_port", 0)?;

        if let Some(path) = &file {
            builder = builder.add_source(config::File::from(path.as_path()).required(true));
        }

        let settings: Self = builder
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read predictor configuration")?
            .try_deserialize()
            .context("Invalid predictor configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }
        self.predictor_config()?.validate()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Runtime predictor settings; the recipe must match the artifact's
    pub fn predictor_config(&self) -> Result<PredictorConfig> {
        Ok(PredictorConfig {
            recipe: FeatureRecipe::new(self.max_lag, self.roll_window)?,
            min_history: self.min_history,
            low_threshold: self.low_threshold,
            high_threshold: self.high_threshold,
            rotation_policy: self.rotation_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let settings = PredictorSettings::from_sources(None, env(&[])).unwrap();
        assert_eq!(settings.log_path, PathBuf::from("heart_rate_log.csv"));
        assert_eq!(settings.model_dir, PathBuf::from("models"));
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.min_history, 20);
        assert_eq!(settings.rotation_policy, RotationPolicy::Retain);
        assert_eq!(settings.output_format, OutputFormat::Text);
        assert_eq!(settings.api_port, 0);
        assert_eq!(settings.predictor_config().unwrap(), PredictorConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let settings = PredictorSettings::from_sources(
            None,
            env(&[
                ("PULSE_MAX_LAG", "3"),
                ("PULSE_ROTATION_POLICY", "flush"),
                ("PULSE_OUTPUT_FORMAT", "json"),
                ("PULSE_API_PORT", "9100"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.max_lag, 3);
        assert_eq!(settings.rotation_policy, RotationPolicy::Flush);
        assert_eq!(settings.output_format, OutputFormat::Json);
        assert_eq!(settings.api_port, 9100);
    }

    #[test]
    fn test_config_file_then_environment() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pulse.toml");
        std::fs::write(&path, "min_history = 30\nlow_threshold = 50.0\n").unwrap();

        let settings =
            PredictorSettings::from_sources(Some(path), env(&[("PULSE_MIN_HISTORY", "40")]))
                .unwrap();
        assert_eq!(settings.min_history, 40);
        assert_eq!(settings.low_threshold, 50.0);
    }

    #[test]
    fn test_rejects_invalid_values() {
        for vars in [
            [("PULSE_POLL_INTERVAL_MS", "0")],
            [("PULSE_MAX_LAG", "0")],
            [("PULSE_MIN_HISTORY", "0")],
            [("PULSE_LOW_THRESHOLD", "150")],
        ] {
            assert!(PredictorSettings::from_sources(None, env(&vars)).is_err());
        }
    }
}
