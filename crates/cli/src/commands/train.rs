//! `pulse train`: fit and save a model artifact

use anyhow::{Context, Result};
use clap::Args;
use forecast_lib::{
    artifact::{ArtifactChecksums, ArtifactMetadata},
    features::FeatureRecipe,
    observability::StructuredLogger,
    training::{Trainer, TrainerConfig, DEFAULT_LEGACY_LOG_PATH, DEFAULT_LOG_PATH},
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use crate::output::{
    color_r2, format_mae, print_info, print_json, print_success, print_table, print_warning,
    short_digest, FieldRow, OutputFormat,
};

/// Arguments for `pulse train`
#[derive(Debug, Args)]
pub struct TrainArgs {
    /// Structured heart-rate log
    #[arg(long = "log", env = "PULSE_LOG_PATH", default_value = DEFAULT_LOG_PATH)]
    pub log_path: PathBuf,

    /// Free-text log used when the structured log is absent
    #[arg(long = "legacy-log", env = "PULSE_LEGACY_LOG_PATH", default_value = DEFAULT_LEGACY_LOG_PATH)]
    pub legacy_log_path: PathBuf,

    /// Directory the artifact is written to
    #[arg(long, env = "PULSE_MODEL_DIR", default_value = "models")]
    pub model_dir: PathBuf,

    /// Share of the most recent rows held out for evaluation
    #[arg(long, env = "PULSE_TEST_FRACTION", default_value_t = 0.2)]
    pub test_fraction: f64,

    /// Recorded in the artifact for provenance
    #[arg(long, env = "PULSE_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Number of lag features
    #[arg(long, env = "PULSE_MAX_LAG", default_value_t = 5)]
    pub max_lag: usize,

    /// Rolling window length in readings
    #[arg(long, env = "PULSE_ROLL_WINDOW", default_value_t = 10)]
    pub roll_window: usize,
}

/// JSON shape of a training report
#[derive(Debug, Serialize)]
struct TrainReport<'a> {
    model_dir: &'a PathBuf,
    checksums: &'a ArtifactChecksums,
    metadata: &'a ArtifactMetadata,
}

impl TrainArgs {
    fn trainer_config(&self) -> Result<TrainerConfig> {
        Ok(TrainerConfig {
            log_path: self.log_path.clone(),
            legacy_log_path: self.legacy_log_path.clone(),
            recipe: FeatureRecipe::new(self.max_lag, self.roll_window)?,
            test_fraction: self.test_fraction,
            seed: self.seed,
        })
    }
}

/// Train on the configured log and save the artifact
pub fn run(args: &TrainArgs, format: OutputFormat) -> Result<()> {
    let config = args.trainer_config()?;
    debug!(?config, "Training configuration");
    let trainer = Trainer::new(config)?;
    let artifact = trainer.train().context("Training failed")?;
    let checksums = artifact
        .save(&args.model_dir)
        .with_context(|| format!("Failed to save artifact to {}", args.model_dir.display()))?;

    let metadata = &artifact.metadata;
    StructuredLogger::new("pulse-cli").log_training_complete(
        &args.model_dir,
        metadata.n_train,
        metadata.n_test,
        metadata.metrics.as_ref(),
    );

    match format {
        OutputFormat::Json => print_json(&TrainReport {
            model_dir: &args.model_dir,
            checksums: &checksums,
            metadata,
        }),
        OutputFormat::Table => {
            print_success(&format!("Model saved to {}", args.model_dir.display()));
            print_table(&report_rows(metadata, &checksums));
            match &metadata.metrics {
                Some(m) if m.r2 < 0.0 => print_warning(
                    "Model explains less variance than predicting the mean; collect more data",
                ),
                Some(_) => {}
                None => print_warning("No rows were held out; metrics unavailable"),
            }
            print_info(&format!(
                "Serve with PULSE_MODEL_DIR={} PULSE_MAX_LAG={} PULSE_ROLL_WINDOW={}",
                args.model_dir.display(),
                metadata.max_lag,
                metadata.roll_window
            ));
            Ok(())
        }
    }
}

fn report_rows(metadata: &ArtifactMetadata, checksums: &ArtifactChecksums) -> Vec<FieldRow> {
    let cleaning = &metadata.cleaning;
    let mut rows = vec![
        FieldRow::new("Source", metadata.source.display()),
        FieldRow::new("Lines read", cleaning.lines_read),
        FieldRow::new("Malformed", cleaning.malformed),
        FieldRow::new("Outliers", cleaning.outliers),
        FieldRow::new("Devices", cleaning.devices),
        FieldRow::new("Rows", cleaning.rows),
        FieldRow::new("Train / test", format!("{} / {}", metadata.n_train, metadata.n_test)),
    ];
    match &metadata.metrics {
        Some(m) => {
            rows.push(FieldRow::new("R²", color_r2(m.r2)));
            rows.push(FieldRow::new("MAE", format_mae(m.mae)));
        }
        None => rows.push(FieldRow::new("Metrics", "n/a")),
    }
    rows.push(FieldRow::new("Model checksum", short_digest(&checksums.model)));
    rows
}
