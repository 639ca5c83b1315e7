//! CLI integration tests

use std::fmt::Write as _;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn pulse(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pulse"))
        .args(args)
        .env_remove("PULSE_FORMAT")
        .env_remove("PULSE_MODEL_DIR")
        .env_remove("PULSE_LOG_PATH")
        .output()
        .expect("Failed to execute pulse")
}

fn write_log(path: &Path, readings: usize) {
    let mut log = String::from("timestamp,device,heart_rate\n");
    for i in 0..readings {
        writeln!(
            log,
            "2024-01-01 08:{:02}:{:02},Monitor_A,{}",
            i / 60,
            i % 60,
            70 + (i % 10)
        )
        .unwrap();
    }
    std::fs::write(path, log).unwrap();
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = pulse(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("train"), "Should show train command");
    assert!(stdout.contains("inspect"), "Should show inspect command");
    assert!(stdout.contains("stats"), "Should show stats command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = pulse(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("pulse"), "Should show binary name");
}

#[test]
fn test_train_then_inspect() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("heart_rate_log.csv");
    let model_dir = dir.path().join("models");
    write_log(&log, 120);

    let output = pulse(&[
        "train",
        "--log",
        log.to_str().unwrap(),
        "--legacy-log",
        dir.path().join("missing.txt").to_str().unwrap(),
        "--model-dir",
        model_dir.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert!(
        output.status.success(),
        "train failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["metadata"]["max_lag"], 5);
    assert_eq!(report["metadata"]["cleaning"]["devices"], 1);
    assert!(model_dir.join("model.json").exists());
    assert!(model_dir.join("scaler.json").exists());
    assert!(model_dir.join("metadata.json").exists());

    let output = pulse(&[
        "inspect",
        "--model-dir",
        model_dir.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert!(output.status.success());
    let inspected: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        inspected["metadata"]["feature_cols"][3],
        serde_json::Value::from("hr_lag_1")
    );
}

#[test]
fn test_train_without_log_fails() {
    let dir = TempDir::new().unwrap();
    let output = pulse(&[
        "train",
        "--log",
        dir.path().join("absent.csv").to_str().unwrap(),
        "--legacy-log",
        dir.path().join("absent.txt").to_str().unwrap(),
        "--model-dir",
        dir.path().join("models").to_str().unwrap(),
    ]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no log source found"), "stderr: {}", stderr);
}

#[test]
fn test_inspect_rejects_tampered_artifact() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("heart_rate_log.csv");
    let model_dir = dir.path().join("models");
    write_log(&log, 60);

    let trained = pulse(&[
        "train",
        "--log",
        log.to_str().unwrap(),
        "--model-dir",
        model_dir.to_str().unwrap(),
    ]);
    assert!(trained.status.success());

    let model_path = model_dir.join("model.json");
    let text = std::fs::read_to_string(&model_path).unwrap();
    std::fs::write(&model_path, text.replacen("intercept", "intercept ", 1)).unwrap();

    let output = pulse(&["inspect", "--model-dir", model_dir.to_str().unwrap()]);
    assert!(!output.status.success());
}

#[test]
fn test_stats_summarises_latest_window() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("heart_rate_log.csv");
    // 70..=79 repeating; the last five are 75..=79
    write_log(&log, 40);

    let output = pulse(&[
        "stats",
        "--log",
        log.to_str().unwrap(),
        "--window",
        "5",
        "--high",
        "78",
        "--format",
        "json",
    ]);
    assert!(
        output.status.success(),
        "stats failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let stats = &report["stats"];
    assert_eq!(stats["readings"], 5);
    assert_eq!(stats["average"], 77.0);
    assert_eq!(stats["min"], 75);
    assert_eq!(stats["max"], 79);
    assert_eq!(stats["latest"]["heart_rate"], 79);
    assert_eq!(stats["latest"]["device"], "Monitor_A");
    assert_eq!(stats["classification"], "HIGH");
    assert_eq!(report["malformed"], 0);
}

#[test]
fn test_stats_without_log_reports_no_data() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.csv");

    let output = pulse(&["stats", "--log", missing.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No data yet"));

    let output = pulse(&["stats", "--log", missing.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(report["stats"].is_null());
}
