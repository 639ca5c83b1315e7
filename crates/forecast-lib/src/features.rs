//! Feature derivation shared by training and online inference
//!
//! A [`FeatureRecipe`] turns a time-ascending history of one device's
//! readings into a fixed-order vector:
//!
//! `[hour, minute, second, hr_lag_1 .. hr_lag_k, hr_roll_mean, hr_roll_std]`
//!
//! The trainer's batch path ([`FeatureRecipe::derive_series`]) and the
//! online predictor both call [`FeatureRecipe::derive`]; there is no second
//! implementation. The `(max_lag, roll_window)` pair and the column names are
//! recorded in every model artifact and checked before scoring.

use crate::error::{ForecastError, Result};
use crate::models::Reading;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Number of time-of-day columns at the front of every vector
pub const TIME_FEATURES: usize = 3;

/// Number of rolling-statistic columns at the end of every vector
pub const ROLLING_FEATURES: usize = 2;

/// Slack added on top of the history a prediction needs
pub const HISTORY_MARGIN: usize = 5;

/// Smallest per-device history capacity
pub const MIN_HISTORY_CAPACITY: usize = 200;

/// Fixed-length ordered feature values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// A feature vector paired with the next reading of the same device
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    /// Timestamp of the reading the features end at
    pub timestamp: NaiveDateTime,
    pub device: String,
    pub features: FeatureVector,
    /// Heart rate of the following reading
    pub label: f64,
}

/// Parameters of the feature derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecipe {
    pub max_lag: usize,
    pub roll_window: usize,
}

impl Default for FeatureRecipe {
    fn default() -> Self {
        Self {
            max_lag: 5,
            roll_window: 10,
        }
    }
}

impl FeatureRecipe {
    pub fn new(max_lag: usize, roll_window: usize) -> Result<Self> {
        if max_lag == 0 {
            return Err(ForecastError::InvalidConfig(
                "max_lag must be at least 1".to_string(),
            ));
        }
        if roll_window == 0 {
            return Err(ForecastError::InvalidConfig(
                "roll_window must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_lag,
            roll_window,
        })
    }

    /// Length of every vector this recipe produces
    pub fn width(&self) -> usize {
        TIME_FEATURES + self.max_lag + ROLLING_FEATURES
    }

    /// Column names in output order
    pub fn column_names(&self) -> Vec<String> {
        let mut cols = Vec::with_capacity(self.width());
        cols.extend(["hour", "minute", "second"].map(String::from));
        cols.extend((1..=self.max_lag).map(|k| format!("hr_lag_{}", k)));
        cols.push("hr_roll_mean".to_string());
        cols.push("hr_roll_std".to_string());
        cols
    }

    /// Capacity of a per-device history buffer for a given `min_history`
    pub fn history_capacity(&self, min_history: usize) -> usize {
        MIN_HISTORY_CAPACITY.max(min_history + self.roll_window + self.max_lag + HISTORY_MARGIN)
    }

    /// Shortest history for which every lag refers to a real prior reading
    pub fn full_lag_history(&self) -> usize {
        self.max_lag + 1
    }

    /// Derive the feature vector ending at the last reading of `history`.
    ///
    /// `history` must be time-ascending and belong to a single device.
    /// Returns `None` only for an empty history. When the history is shorter
    /// than `k + 1`, lag `k` falls back to the earliest available reading.
    pub fn derive(&self, history: &[Reading]) -> Option<FeatureVector> {
        let last = history.last()?;
        let n = history.len();

        let mut values = Vec::with_capacity(self.width());
        values.push(last.timestamp.hour() as f64);
        values.push(last.timestamp.minute() as f64);
        values.push(last.timestamp.second() as f64);

        for k in 1..=self.max_lag {
            let idx = if n > k { n - 1 - k } else { 0 };
            values.push(history[idx].heart_rate as f64);
        }

        let window = &history[n.saturating_sub(self.roll_window)..];
        let (mean, std) = mean_and_std(window.iter().map(|r| r.heart_rate as f64));
        values.push(mean);
        values.push(std);

        Some(FeatureVector(values))
    }

    /// Batch path: one labelled row per reading that has full lag history
    /// and a successor.
    ///
    /// `series` must be time-ascending and belong to a single device.
    pub fn derive_series(&self, series: &[Reading]) -> Vec<LabeledRow> {
        let start = self.max_lag;
        if series.len() < start + 2 {
            return Vec::new();
        }

        (start..series.len() - 1)
            .filter_map(|i| {
                let features = self.derive(&series[..=i])?;
                Some(LabeledRow {
                    timestamp: series[i].timestamp,
                    device: series[i].device.clone(),
                    features,
                    label: series[i + 1].heart_rate as f64,
                })
            })
            .collect()
    }
}

/// Mean and population standard deviation; `(0, 0)` for no values
fn mean_and_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let count = values.clone().count();
    if count == 0 {
        return (0.0, 0.0);
    }
    let n = count as f64;
    let mean = values.clone().sum::<f64>() / n;
    if count == 1 {
        return (mean, 0.0);
    }
    let sum_sq: f64 = values.map(|v| (v - mean).powi(2)).sum();
    (mean, (sum_sq / n).sqrt())
}
