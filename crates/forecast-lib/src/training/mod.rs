//! Offline model training
//!
//! This module provides:
//! - Loading of structured and legacy heart-rate logs
//! - Per-device IQR outlier filtering
//! - Standardization and least-squares fitting
//! - Chronological evaluation split and metrics

mod cleaning;
mod linear;
mod loader;
mod scaler;
mod trainer;


pub use cleaning::{filter_outliers, group_by_device, quantile, IqrBounds, IQR_MULTIPLIER};
pub use linear::{mean_absolute_error, r2_score, EvaluationMetrics, LinearModel};
pub use loader::{load_any, load_legacy, load_structured, parse_legacy_line, LoadedLog, LogFormat};
pub use scaler::StandardScaler;
pub use trainer::{
    chronological_split, CleaningReport, Trainer, TrainerConfig, DEFAULT_LEGACY_LOG_PATH,
    DEFAULT_LOG_PATH,
};
