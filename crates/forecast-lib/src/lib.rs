//! Heart-rate forecasting library
//!
//! This crate provides the core functionality for:
//! - Tailing a rotating sensor log
//! - Feature derivation shared by training and inference
//! - Offline training and model artifact persistence
//! - Online next-value prediction with threshold alerts
//! - Health checks and observability

pub mod artifact;
pub mod error;
pub mod features;
pub mod health;
pub mod models;
pub mod observability;
pub mod parse;
pub mod predictor;
pub mod tailer;
pub mod training;

pub use artifact::ModelArtifact;
pub use error::{ForecastError, ParseError, Result};
pub use features::{FeatureRecipe, FeatureVector};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ForecastMetrics, StructuredLogger};
