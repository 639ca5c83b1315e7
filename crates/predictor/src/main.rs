//! Pulse Predictor - online heart-rate forecasting daemon
//!
//! Tails the sensor log, keeps a short history per device and prints a
//! next-value prediction with a LOW/NORMAL/HIGH classification for every
//! new reading once enough history has accumulated.

use anyhow::{Context, Result};
use forecast_lib::{
    health::{components, HealthRegistry},
    observability::{ForecastMetrics, StructuredLogger},
    predictor::{prime_from_log, run_predictor, OnlinePredictor, PredictionSink},
    tailer::LogTailer,
    ModelArtifact,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const PREDICTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // JSON logs go to stderr so stdout carries only predictions
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let settings = config::PredictorSettings::load()?;
    let logger = StructuredLogger::new("pulse-predictor");
    logger.log_startup(PREDICTOR_VERSION, &settings.log_path, &settings.model_dir);

    let health_registry = HealthRegistry::new();
    health_registry.register(components::TAILER).await;
    health_registry.register(components::PREDICTOR).await;
    let _metrics = ForecastMetrics::new();

    let artifact = ModelArtifact::load(&settings.model_dir).with_context(|| {
        format!(
            "Failed to load model artifact from {}",
            settings.model_dir.display()
        )
    })?;
    let mut predictor = OnlinePredictor::new(artifact, settings.predictor_config()?)
        .context("Model artifact does not match the configured feature recipe")?;

    let api_handle = if settings.api_port != 0 {
        let state = Arc::new(api::AppState::new(health_registry.clone()));
        Some(tokio::spawn(api::serve(settings.api_port, state)))
    } else {
        None
    };

    let mut tailer = LogTailer::new(&settings.log_path);
    prime_from_log(&mut tailer, &mut predictor)
        .with_context(|| format!("Failed to prime from {}", settings.log_path.display()))?;
    health_registry.mark_primed().await;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                warn!(error = %e, "Unable to listen for Ctrl-C; stop the process externally");
                std::future::pending::<()>().await;
            }
        }
    });

    let mut sink = PredictionSink::new(std::io::stdout(), settings.output_format);
    let summary = run_predictor(
        &mut tailer,
        &mut predictor,
        settings.poll_interval(),
        &mut sink,
        &health_registry,
        shutdown_rx,
    )
    .await;

    logger.log_shutdown("SIGINT received");
    if let Some(handle) = api_handle {
        handle.abort();
    }

    info!(
        lines_seen = summary.lines_seen,
        readings = summary.readings,
        malformed = summary.malformed,
        predictions = summary.predictions,
        low = summary.low,
        normal = summary.normal,
        high = summary.high,
        rotations = summary.rotations,
        devices = summary.devices,
        "Predictor stopped"
    );
    eprintln!(
        "Processed {} readings ({} malformed lines) from {} device(s); {} predictions: {} low, {} normal, {} high; {} rotation(s)",
        summary.readings,
        summary.malformed,
        summary.devices,
        summary.predictions,
        summary.low,
        summary.normal,
        summary.high,
        summary.rotations
    );

    Ok(())
}
