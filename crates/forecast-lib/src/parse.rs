//! Row parsing for the structured heart-rate log
//!
//! The sensor logger writes `timestamp,device,heart_rate` rows behind a
//! header line. Batch loaders may see other column orders (or no device
//! column at all), so positions are described by a [`CsvLayout`].

use crate::error::ParseError;
use crate::models::{Reading, UNKNOWN_DEVICE};
use chrono::NaiveDateTime;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Column positions within a structured row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvLayout {
    pub timestamp: usize,
    pub device: Option<usize>,
    pub heart_rate: usize,
}

impl Default for CsvLayout {
    fn default() -> Self {
        Self {
            timestamp: 0,
            device: Some(1),
            heart_rate: 2,
        }
    }
}

impl CsvLayout {
    /// Derive a layout from a header line.
    ///
    /// Returns `None` when the line does not name both `timestamp` and
    /// `heart_rate`, i.e. when it is a data row rather than a header.
    pub fn from_header(line: &str) -> Option<Self> {
        let names: Vec<String> = line
            .split(',')
            .map(|c| c.trim().trim_matches('"').to_ascii_lowercase())
            .collect();
        let position = |name: &str| names.iter().position(|n| n == name);

        Some(Self {
            timestamp: position("timestamp")?,
            device: position("device"),
            heart_rate: position("heart_rate")?,
        })
    }

    fn min_fields(&self) -> usize {
        self.timestamp
            .max(self.heart_rate)
            .max(self.device.unwrap_or(0))
            + 1
    }

    /// Parse one data row into a [`Reading`]
    pub fn parse(&self, line: &str) -> Result<Reading, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let fields: Vec<&str> = line.split(',').map(|f| f.trim().trim_matches('"')).collect();
        let min = self.min_fields();
        if fields.len() < min {
            return Err(ParseError::MissingField {
                expected: min,
                found: fields.len(),
            });
        }

        let timestamp = parse_timestamp(fields[self.timestamp])?;
        let heart_rate = parse_heart_rate(fields[self.heart_rate])?;
        let device = self
            .device
            .map(|idx| fields[idx])
            .filter(|d| !d.is_empty())
            .unwrap_or(UNKNOWN_DEVICE);

        Ok(Reading::new(timestamp, device, heart_rate))
    }
}

/// Parse a row in the default `timestamp,device,heart_rate` layout
pub fn parse_line(line: &str) -> Result<Reading, ParseError> {
    CsvLayout::default().parse(line)
}

/// Parse a local wall-clock timestamp in any of the accepted formats
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, ParseError> {
    let raw = raw.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| ParseError::InvalidTimestamp(raw.to_string()))
}

fn parse_heart_rate(raw: &str) -> Result<u32, ParseError> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidHeartRate(raw.to_string()))
}
