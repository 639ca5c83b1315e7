//! Online prediction engine

mod history;
mod online;
mod output;
mod runner;

pub use history::DeviceHistory;
pub use online::{
    OnlinePredictor, PredictorConfig, PredictorSummary, RotationPolicy, DEFAULT_HIGH_THRESHOLD,
    DEFAULT_LOW_THRESHOLD, DEFAULT_MIN_HISTORY,
};
pub use output::{format_prediction, OutputFormat, PredictionSink};
pub use runner::{prime_from_log, run_predictor, DEFAULT_POLL_INTERVAL};
