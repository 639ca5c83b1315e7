//! Core data models for the heart-rate pipeline

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device identifier used when a row carries no device column
pub const UNKNOWN_DEVICE: &str = "unknown";

/// Timestamp format written by the sensor logger
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One timestamped heart-rate observation for a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub device: String,
    pub heart_rate: u32,
}

impl Reading {
    pub fn new(timestamp: NaiveDateTime, device: impl Into<String>, heart_rate: u32) -> Self {
        let device = device.into();
        Self {
            timestamp,
            device: if device.is_empty() {
                UNKNOWN_DEVICE.to_string()
            } else {
                device
            },
            heart_rate,
        }
    }
}

/// Threshold classification of a predicted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Low,
    Normal,
    High,
}

impl AlertLevel {
    /// Classify against inclusive `[low, high]` normal band
    pub fn classify(value: f64, low: f64, high: f64) -> Self {
        if value < low {
            AlertLevel::Low
        } else if value > high {
            AlertLevel::High
        } else {
            AlertLevel::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Low => "LOW",
            AlertLevel::Normal => "NORMAL",
            AlertLevel::High => "HIGH",
        }
    }

    pub fn is_alert(&self) -> bool {
        !matches!(self, AlertLevel::Normal)
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A next-value prediction emitted by the online predictor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub timestamp: NaiveDateTime,
    pub device: String,
    pub current: u32,
    pub predicted_next: f64,
    pub classification: AlertLevel,
}
