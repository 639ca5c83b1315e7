//! Historical log loading for training
//!
//! The structured CSV log is preferred. When only a legacy free-text log is
//! present, readings are recovered line by line from a leading timestamp, an
//! optional device token and a trailing integer.

use crate::error::{ForecastError, ParseError, Result};
use crate::models::{Reading, UNKNOWN_DEVICE};
use crate::parse::{parse_timestamp, CsvLayout};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Which format a log was read as
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Structured,
    Legacy,
}

/// Readings recovered from a log file plus what was dropped on the way
#[derive(Debug, Clone)]
pub struct LoadedLog {
    pub source: PathBuf,
    pub format: LogFormat,
    pub readings: Vec<Reading>,
    /// Non-blank lines seen, header included
    pub lines_read: usize,
    /// Lines that did not yield a reading
    pub malformed: usize,
}

/// Load the structured log if present, otherwise the legacy one
pub fn load_any(structured: &Path, legacy: &Path) -> Result<LoadedLog> {
    if structured.exists() {
        return load_structured(structured);
    }
    if legacy.exists() {
        let loaded = load_legacy(legacy)?;
        if !loaded.readings.is_empty() {
            return Ok(loaded);
        }
        info!(path = %legacy.display(), "Legacy log contained no recoverable readings");
    }
    Err(ForecastError::SourceNotFound(vec![
        structured.to_path_buf(),
        legacy.to_path_buf(),
    ]))
}

/// Load a structured `timestamp,device,heart_rate` log.
///
/// A header on the first non-blank line sets the column layout; without
/// one the default layout applies and the first line is treated as data.
pub fn load_structured(path: &Path) -> Result<LoadedLog> {
    let text = read_lossy(path)?;
    let mut lines = text.lines().filter(|l| !l.trim().is_empty()).peekable();

    let mut layout = CsvLayout::default();
    let mut lines_read = 0;
    if let Some(first) = lines.peek() {
        if let Some(header) = CsvLayout::from_header(first) {
            layout = header;
            lines.next();
            lines_read += 1;
        }
    }

    let mut readings = Vec::new();
    let mut malformed = 0;
    for line in lines {
        lines_read += 1;
        match layout.parse(line) {
            Ok(reading) => readings.push(reading),
            Err(e) => {
                malformed += 1;
                debug!(error = %e, "Skipping malformed log row");
            }
        }
    }

    info!(
        path = %path.display(),
        readings = readings.len(),
        malformed,
        "Loaded structured log"
    );

    Ok(LoadedLog {
        source: path.to_path_buf(),
        format: LogFormat::Structured,
        readings,
        lines_read,
        malformed,
    })
}

/// Load a legacy free-text log, dropping lines without the expected pattern
pub fn load_legacy(path: &Path) -> Result<LoadedLog> {
    let text = read_lossy(path)?;

    let mut readings = Vec::new();
    let mut lines_read = 0;
    let mut malformed = 0;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        lines_read += 1;
        match parse_legacy_line(line) {
            Ok(reading) => readings.push(reading),
            Err(_) => malformed += 1,
        }
    }

    info!(
        path = %path.display(),
        readings = readings.len(),
        malformed,
        "Loaded legacy log"
    );

    Ok(LoadedLog {
        source: path.to_path_buf(),
        format: LogFormat::Legacy,
        readings,
        lines_read,
        malformed,
    })
}

fn legacy_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\s*(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2})(.*?)(\d+)\s*(?:bpm)?\s*$")
            .expect("legacy line pattern is valid")
    })
}

/// Parse one legacy line such as `2024-01-01 08:00:00 Monitor_A 72 bpm`
pub fn parse_legacy_line(line: &str) -> std::result::Result<Reading, ParseError> {
    let caps = legacy_pattern()
        .captures(line)
        .ok_or(ParseError::NoLegacyMatch)?;

    let raw_ts = caps[1].split_whitespace().collect::<Vec<_>>().join(" ");
    let timestamp = parse_timestamp(&raw_ts)?;
    let heart_rate = caps[3]
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidHeartRate(caps[3].to_string()))?;
    let device = caps[2]
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .find(|t| !t.is_empty())
        .unwrap_or(UNKNOWN_DEVICE);

    Ok(Reading::new(timestamp, device, heart_rate))
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
