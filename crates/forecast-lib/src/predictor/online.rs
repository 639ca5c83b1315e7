//! Online next-value predictor
//!
//! Consumes raw log lines in file order, keeps a bounded history per device
//! and scores the artifact's model once a device has `min_history` readings.
//! Features come from the same [`FeatureRecipe`] the trainer used; the
//! artifact's recorded recipe is checked before anything is scored.

use super::history::DeviceHistory;
use crate::artifact::ModelArtifact;
use crate::error::{ForecastError, Result};
use crate::features::FeatureRecipe;
use crate::models::{AlertLevel, Prediction};
use crate::observability::ForecastMetrics;
use crate::parse::parse_line;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Readings a device needs before its first prediction
pub const DEFAULT_MIN_HISTORY: usize = 20;

pub const DEFAULT_LOW_THRESHOLD: f64 = 60.0;
pub const DEFAULT_HIGH_THRESHOLD: f64 = 100.0;

/// What happens to device histories when the log rotates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// Keep histories; the new file continues the same streams
    #[default]
    Retain,
    /// Empty every history; devices stay known but must rebuild
    /// `min_history` readings before predicting again
    Flush,
}

/// Runtime settings of the online predictor
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
    pub recipe: FeatureRecipe,
    pub min_history: usize,
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub rotation_policy: RotationPolicy,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            recipe: FeatureRecipe::default(),
            min_history: DEFAULT_MIN_HISTORY,
            low_threshold: DEFAULT_LOW_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            rotation_policy: RotationPolicy::default(),
        }
    }
}

impl PredictorConfig {
    pub fn validate(&self) -> Result<()> {
        FeatureRecipe::new(self.recipe.max_lag, self.recipe.roll_window)?;
        if self.min_history == 0 {
            return Err(ForecastError::InvalidConfig(
                "min_history must be at least 1".to_string(),
            ));
        }
        if !(self.low_threshold <= self.high_threshold) {
            return Err(ForecastError::InvalidConfig(format!(
                "low_threshold {} exceeds high_threshold {}",
                self.low_threshold, self.high_threshold
            )));
        }
        Ok(())
    }
}

/// Running counters of a predictor instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictorSummary {
    pub lines_seen: u64,
    pub readings: u64,
    pub malformed: u64,
    pub predictions: u64,
    pub low: u64,
    pub normal: u64,
    pub high: u64,
    pub rotations: u64,
    pub devices: usize,
}

/// Streaming predictor over one loaded artifact
pub struct OnlinePredictor {
    artifact: ModelArtifact,
    config: PredictorConfig,
    histories: HashMap<String, DeviceHistory>,
    summary: PredictorSummary,
    metrics: ForecastMetrics,
}

impl OnlinePredictor {
    /// Build a predictor, refusing an artifact trained with another recipe
    pub fn new(artifact: ModelArtifact, config: PredictorConfig) -> Result<Self> {
        config.validate()?;
        artifact.ensure_compatible(&config.recipe)?;
        let width = config.recipe.width();
        if artifact.model.width() != width || artifact.scaler.width() != width {
            return Err(ForecastError::ConfigurationMismatch {
                field: "width",
                artifact: artifact.model.width().to_string(),
                runtime: width.to_string(),
            });
        }

        info!(
            max_lag = config.recipe.max_lag,
            roll_window = config.recipe.roll_window,
            min_history = config.min_history,
            rotation_policy = ?config.rotation_policy,
            "Online predictor ready"
        );

        Ok(Self {
            artifact,
            config,
            histories: HashMap::new(),
            summary: PredictorSummary::default(),
            metrics: ForecastMetrics::new(),
        })
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Fill histories from already-written lines without predicting.
    ///
    /// Returns the number of readings absorbed.
    pub fn prime<I, S>(&mut self, lines: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.summary.readings;
        for line in lines {
            self.record(line.as_ref());
        }
        let primed = (self.summary.readings - before) as usize;
        debug!(primed, devices = self.histories.len(), "Primed device histories");
        primed
    }

    /// Ingest one log line; returns a prediction once the device has enough
    /// history
    pub fn ingest_line(&mut self, line: &str) -> Option<Prediction> {
        let device = self.record(line)?;
        let min_history = self.config.min_history;
        let history = self.histories.get_mut(&device)?;
        if history.len() < min_history {
            return None;
        }

        let started = Instant::now();
        let window = history.as_slice();
        let features = self.config.recipe.derive(window)?;
        let latest = window.last()?;
        let predicted_next = self.artifact.predict(&features);
        let classification = AlertLevel::classify(
            predicted_next,
            self.config.low_threshold,
            self.config.high_threshold,
        );
        let prediction = Prediction {
            timestamp: latest.timestamp,
            device: latest.device.clone(),
            current: latest.heart_rate,
            predicted_next,
            classification,
        };
        self.metrics.observe_prediction_latency(started.elapsed().as_secs_f64());

        self.summary.predictions += 1;
        match classification {
            AlertLevel::Low => self.summary.low += 1,
            AlertLevel::Normal => self.summary.normal += 1,
            AlertLevel::High => self.summary.high += 1,
        }
        self.metrics.inc_prediction(classification);

        Some(prediction)
    }

    /// React to a log rotation according to the configured policy
    pub fn on_rotation(&mut self) {
        self.summary.rotations += 1;
        self.metrics.inc_rotations();
        if self.config.rotation_policy == RotationPolicy::Flush {
            for history in self.histories.values_mut() {
                history.clear();
            }
            debug!(devices = self.histories.len(), "Flushed device histories");
        }
    }

    /// Count lines the tailer dropped before they could be parsed
    pub fn record_dropped_lines(&mut self, count: u64) {
        self.summary.lines_seen += count;
        self.summary.malformed += count;
        self.metrics.add_lines_tailed(count as usize);
        self.metrics.add_malformed(count);
    }

    /// Readings currently held for `device`
    pub fn history_len(&self, device: &str) -> usize {
        self.histories.get(device).map_or(0, DeviceHistory::len)
    }

    pub fn summary(&self) -> PredictorSummary {
        PredictorSummary {
            devices: self.histories.len(),
            ..self.summary
        }
    }

    /// Parse a line into its device's history; returns the device on success
    fn record(&mut self, line: &str) -> Option<String> {
        self.summary.lines_seen += 1;
        self.metrics.add_lines_tailed(1);

        let reading = match parse_line(line) {
            Ok(r) => r,
            Err(e) => {
                self.summary.malformed += 1;
                self.metrics.inc_malformed();
                debug!(error = %e, "Skipping malformed line");
                return None;
            }
        };
        self.summary.readings += 1;

        let device = reading.device.clone();
        let capacity = self.config.recipe.history_capacity(self.config.min_history);
        let is_new = !self.histories.contains_key(&device);
        self.histories
            .entry(device.clone())
            .or_insert_with(|| DeviceHistory::new(capacity))
            .push(reading);
        if is_new {
            debug!(device = %device, capacity, "Tracking new device");
            self.metrics.set_devices_tracked(self.histories.len());
        }
        Some(device)
    }
}
