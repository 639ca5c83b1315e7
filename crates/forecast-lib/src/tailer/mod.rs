//! Log tailing
//!
//! This module provides a cooperative, polling-based tailer for the sensor
//! log. The log may be rotated or truncated by an external archiver at any
//! time, and the writer may be mid-line when a poll happens.

mod log_tailer;

#[cfg(test)]
mod tests;

pub use log_tailer::{LogCursor, LogTailer, TailBatch, DEFAULT_MAX_CHUNK_BYTES};
