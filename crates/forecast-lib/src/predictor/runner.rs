//! Predictor polling loop
//!
//! Each tick polls the tailer once and pushes every surfaced line through
//! the predictor. Shutdown is only observed between ticks, so a batch that
//! has been read is always fully processed.

use super::online::{OnlinePredictor, PredictorSummary};
use super::output::PredictionSink;
use crate::health::HealthRegistry;
use crate::observability::StructuredLogger;
use crate::tailer::LogTailer;
use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Default delay between tailer polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Feed everything already in the log into the predictor's histories.
///
/// Polls until the tailer reports it has caught up with the end of the
/// file, so the cursor is left at EOF and nothing is ingested twice.
pub fn prime_from_log(tailer: &mut LogTailer, predictor: &mut OnlinePredictor) -> io::Result<usize> {
    let mut primed = 0;
    loop {
        let batch = tailer.poll()?;
        predictor.record_dropped_lines(batch.oversized);
        primed += predictor.prime(&batch.lines);
        if !batch.file_present || batch.caught_up {
            break;
        }
    }
    info!(
        path = %tailer.path().display(),
        offset = tailer.cursor().offset,
        primed,
        devices = predictor.summary().devices,
        "Primed predictor from existing log"
    );
    Ok(primed)
}

/// Run the polling loop until `shutdown` fires, returning the final summary
pub async fn run_predictor<W: Write>(
    tailer: &mut LogTailer,
    predictor: &mut OnlinePredictor,
    poll_interval: Duration,
    sink: &mut PredictionSink<W>,
    health: &HealthRegistry,
    mut shutdown: broadcast::Receiver<()>,
) -> PredictorSummary {
    info!(
        path = %tailer.path().display(),
        interval_ms = poll_interval.as_millis() as u64,
        "Starting predictor loop"
    );

    let logger = StructuredLogger::new("pulse-predictor");
    let mut ticker = interval(poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                poll_once(tailer, predictor, sink, health, &logger).await;
            }
            _ = shutdown.recv() => {
                info!("Shutting down predictor loop");
                break;
            }
        }
    }

    predictor.summary()
}

async fn poll_once<W: Write>(
    tailer: &mut LogTailer,
    predictor: &mut OnlinePredictor,
    sink: &mut PredictionSink<W>,
    health: &HealthRegistry,
    logger: &StructuredLogger,
) {
    let result = tailer.poll();
    let presence = match &result {
        Ok(batch) => Ok(batch.file_present),
        Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
    };
    health.observe_tail(tailer.path(), &presence).await;

    let batch = match result {
        Ok(batch) => batch,
        Err(e) => {
            warn!(path = %tailer.path().display(), error = %e, "Log poll failed");
            return;
        }
    };

    if batch.rotated {
        predictor.on_rotation();
        logger.log_rotation(tailer.path(), predictor.summary().devices);
    }
    if batch.oversized > 0 {
        warn!(dropped = batch.oversized, "Discarded oversized log lines");
        predictor.record_dropped_lines(batch.oversized);
    }
    if batch.lines.is_empty() {
        return;
    }

    debug!(lines = batch.lines.len(), offset = tailer.cursor().offset, "Processing tailed lines");
    for line in &batch.lines {
        if let Some(prediction) = predictor.ingest_line(line) {
            if let Err(e) = sink.emit(&prediction) {
                warn!(error = %e, "Failed to write prediction");
            }
        }
    }
}
