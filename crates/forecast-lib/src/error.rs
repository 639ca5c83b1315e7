//! Error taxonomy for the forecasting pipeline
//!
//! Parse failures are recovered locally by dropping the offending line.
//! Everything in [`ForecastError`] is fatal at the point it is raised.

use std::path::PathBuf;
use thiserror::Error;

/// Why a single log line could not become a [`Reading`](crate::models::Reading)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line is empty")]
    Empty,

    #[error("expected at least {expected} fields, found {found}")]
    MissingField { expected: usize, found: usize },

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid heart rate '{0}'")]
    InvalidHeartRate(String),

    #[error("no timestamp/value pattern in legacy line")]
    NoLegacyMatch,
}

/// Fatal pipeline errors
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("no log source found (looked for {})", format_paths(.0))]
    SourceNotFound(Vec<PathBuf>),

    #[error("artifact {field} mismatch: artifact has {artifact}, runtime configured {runtime}")]
    ConfigurationMismatch {
        field: &'static str,
        artifact: String,
        runtime: String,
    },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid model artifact at {path}: {reason}")]
    Artifact { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
