//! Prediction output formatting
//!
//! One line per prediction, either human-readable text or a JSON object.

use crate::models::{Prediction, TIMESTAMP_FORMAT};
use crate::observability::StructuredLogger;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Line format for emitted predictions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render a prediction as a single line without the trailing newline
pub fn format_prediction(prediction: &Prediction, format: OutputFormat) -> io::Result<String> {
    match format {
        OutputFormat::Text => Ok(format!(
            "{} dev={} current={} next≈{:.1} bpm [{}]",
            prediction.timestamp.format(TIMESTAMP_FORMAT),
            prediction.device,
            prediction.current,
            prediction.predicted_next,
            prediction.classification
        )),
        OutputFormat::Json => serde_json::to_string(prediction).map_err(io::Error::from),
    }
}

/// Writes predictions to a stream and mirrors them into the event log
pub struct PredictionSink<W: Write> {
    writer: W,
    format: OutputFormat,
    logger: StructuredLogger,
}

impl<W: Write> PredictionSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self {
            writer,
            format,
            logger: StructuredLogger::new("pulse-predictor"),
        }
    }

    pub fn emit(&mut self, prediction: &Prediction) -> io::Result<()> {
        let line = format_prediction(prediction, self.format)?;
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;
        self.logger.log_prediction(prediction);
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertLevel;
    use chrono::NaiveDateTime;

    fn prediction() -> Prediction {
        Prediction {
            timestamp: NaiveDateTime::parse_from_str("2024-01-01 08:00:19", TIMESTAMP_FORMAT)
                .unwrap(),
            device: "A".to_string(),
            current: 89,
            predicted_next: 90.04,
            classification: AlertLevel::Normal,
        }
    }

    #[test]
    fn test_text_line() {
        let line = format_prediction(&prediction(), OutputFormat::Text).unwrap();
        assert_eq!(line, "2024-01-01 08:00:19 dev=A current=89 next≈90.0 bpm [NORMAL]");
    }

    #[test]
    fn test_json_line() {
        let line = format_prediction(&prediction(), OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["device"], "A");
        assert_eq!(value["current"], 89);
        assert_eq!(value["classification"], "NORMAL");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_sink_writes_one_line_per_prediction() {
        let mut sink = PredictionSink::new(Vec::new(), OutputFormat::Text);
        sink.emit(&prediction()).unwrap();
        sink.emit(&prediction()).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 2);
    }
}
