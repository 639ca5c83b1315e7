//! Observability infrastructure for the heart-rate pipeline
//!
//! Provides:
//! - Prometheus metrics (lines tailed, predictions by class, rotations, latency)
//! - Structured event logging with tracing

use crate::models::{AlertLevel, Prediction};
use crate::training::EvaluationMetrics;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for per-line prediction latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.000_001, 0.000_005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ForecastMetricsInner> = OnceLock::new();

struct ForecastMetricsInner {
    lines_tailed: IntCounter,
    malformed_lines: IntCounter,
    predictions: IntCounterVec,
    rotations: IntCounter,
    devices_tracked: IntGauge,
    prediction_latency_seconds: Histogram,
}

impl ForecastMetricsInner {
    fn new() -> Self {
        Self {
            lines_tailed: register_int_counter!(
                "pulsecast_lines_tailed_total",
                "Complete log lines surfaced by the tailer"
            )
            .expect("Failed to register lines_tailed"),

            malformed_lines: register_int_counter!(
                "pulsecast_malformed_lines_total",
                "Log lines that did not parse into a reading"
            )
            .expect("Failed to register malformed_lines"),

            predictions: register_int_counter_vec!(
                "pulsecast_predictions_total",
                "Predictions emitted, by classification",
                &["classification"]
            )
            .expect("Failed to register predictions"),

            rotations: register_int_counter!(
                "pulsecast_log_rotations_total",
                "Log truncations or replacements detected by the tailer"
            )
            .expect("Failed to register rotations"),

            devices_tracked: register_int_gauge!(
                "pulsecast_devices_tracked",
                "Devices with a live history buffer"
            )
            .expect("Failed to register devices_tracked"),

            prediction_latency_seconds: register_histogram!(
                "pulsecast_prediction_latency_seconds",
                "Time spent deriving features and scoring one reading",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),
        }
    }
}

/// Pipeline metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ForecastMetrics {
    _private: (),
}

impl Default for ForecastMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ForecastMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ForecastMetricsInner {
        GLOBAL_METRICS.get_or_init(ForecastMetricsInner::new)
    }

    pub fn add_lines_tailed(&self, count: usize) {
        self.inner().lines_tailed.inc_by(count as u64);
    }

    pub fn inc_malformed(&self) {
        self.inner().malformed_lines.inc();
    }

    pub fn add_malformed(&self, count: u64) {
        self.inner().malformed_lines.inc_by(count);
    }

    pub fn inc_prediction(&self, level: AlertLevel) {
        self.inner()
            .predictions
            .with_label_values(&[level.as_str()])
            .inc();
    }

    pub fn inc_rotations(&self) {
        self.inner().rotations.inc();
    }

    pub fn set_devices_tracked(&self, count: usize) {
        self.inner().devices_tracked.set(count as i64);
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }
}

/// Structured logger for pipeline events
///
/// Provides consistent field names for predictions, alerts and lifecycle
/// events so JSON log consumers can filter on `event`.
#[derive(Clone)]
pub struct StructuredLogger {
    source: String,
}

impl StructuredLogger {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Log a prediction; out-of-band classifications are logged at warn
    pub fn log_prediction(&self, prediction: &Prediction) {
        if prediction.classification.is_alert() {
            warn!(
                event = "heart_rate_alert",
                source = %self.source,
                device = %prediction.device,
                current = prediction.current,
                predicted_next = prediction.predicted_next,
                classification = %prediction.classification,
                "Predicted heart rate outside normal band"
            );
        } else {
            info!(
                event = "prediction_generated",
                source = %self.source,
                device = %prediction.device,
                current = prediction.current,
                predicted_next = prediction.predicted_next,
                classification = %prediction.classification,
                "Generated heart rate prediction"
            );
        }
    }

    pub fn log_rotation(&self, path: &Path, retained_devices: usize) {
        info!(
            event = "log_rotated",
            source = %self.source,
            path = %path.display(),
            retained_devices,
            "Log rotation detected, cursor reset"
        );
    }

    pub fn log_training_complete(
        &self,
        model_dir: &Path,
        n_train: usize,
        n_test: usize,
        metrics: Option<&EvaluationMetrics>,
    ) {
        info!(
            event = "training_completed",
            source = %self.source,
            model_dir = %model_dir.display(),
            n_train,
            n_test,
            r2 = metrics.map(|m| m.r2),
            mae = metrics.map(|m| m.mae),
            "Model trained and saved"
        );
    }

    pub fn log_startup(&self, version: &str, log_path: &Path, model_dir: &Path) {
        info!(
            event = "predictor_started",
            source = %self.source,
            version = %version,
            log_path = %log_path.display(),
            model_dir = %model_dir.display(),
            "Heart rate predictor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "predictor_shutdown",
            source = %self.source,
            reason = %reason,
            "Heart rate predictor shutting down"
        );
    }
}
