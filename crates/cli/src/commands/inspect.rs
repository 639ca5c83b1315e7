//! `pulse inspect`: verify and describe a saved artifact

use anyhow::{Context, Result};
use clap::Args;
use forecast_lib::ModelArtifact;
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

use crate::output::{
    color_r2, format_mae, print_json, print_success, print_table, short_digest, FieldRow,
    OutputFormat,
};

/// Arguments for `pulse inspect`
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Directory holding the artifact
    #[arg(long, env = "PULSE_MODEL_DIR", default_value = "models")]
    pub model_dir: PathBuf,
}

/// One fitted coefficient with its standardization parameters
#[derive(Debug, Tabled, Serialize)]
struct CoefficientRow {
    #[tabled(rename = "Feature")]
    feature: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Scale")]
    scale: String,
    #[tabled(rename = "Coefficient")]
    coefficient: String,
}

pub fn run(args: &InspectArgs, format: OutputFormat) -> Result<()> {
    let artifact = ModelArtifact::load(&args.model_dir)
        .with_context(|| format!("Failed to load artifact from {}", args.model_dir.display()))?;

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "model_dir": args.model_dir,
            "metadata": artifact.metadata,
            "model": artifact.model,
            "scaler": artifact.scaler,
        })),
        OutputFormat::Table => {
            print_success(&format!("Artifact at {} verified", args.model_dir.display()));
            print_table(&summary_rows(&artifact));
            print_table(&coefficient_rows(&artifact));
            Ok(())
        }
    }
}

fn summary_rows(artifact: &ModelArtifact) -> Vec<FieldRow> {
    let meta = &artifact.metadata;
    let mut rows = vec![
        FieldRow::new("Format version", meta.format_version),
        FieldRow::new("Trained at", meta.trained_at.format("%Y-%m-%d %H:%M:%S UTC")),
        FieldRow::new("Source", meta.source.display()),
        FieldRow::new("max_lag", meta.max_lag),
        FieldRow::new("roll_window", meta.roll_window),
        FieldRow::new("Train / test", format!("{} / {}", meta.n_train, meta.n_test)),
        FieldRow::new("Test fraction", meta.test_fraction),
        FieldRow::new("Seed", meta.seed),
        FieldRow::new("Intercept", format!("{:.4}", artifact.model.intercept)),
    ];
    if let Some(m) = &meta.metrics {
        rows.push(FieldRow::new("R²", color_r2(m.r2)));
        rows.push(FieldRow::new("MAE", format_mae(m.mae)));
    }
    if let Some(sums) = &meta.checksums {
        rows.push(FieldRow::new("Model checksum", short_digest(&sums.model)));
        rows.push(FieldRow::new("Scaler checksum", short_digest(&sums.scaler)));
    }
    rows
}

fn coefficient_rows(artifact: &ModelArtifact) -> Vec<CoefficientRow> {
    let meta = &artifact.metadata;
    meta.feature_cols
        .iter()
        .zip(&artifact.scaler.mean)
        .zip(&artifact.scaler.scale)
        .zip(&artifact.model.coefficients)
        .map(|(((feature, mean), scale), coefficient)| CoefficientRow {
            feature: feature.clone(),
            mean: format!("{:.3}", mean),
            scale: format!("{:.3}", scale),
            coefficient: format!("{:+.4}", coefficient),
        })
        .collect()
}
