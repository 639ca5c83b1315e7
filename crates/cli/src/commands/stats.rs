//! `pulse stats`: summarise the most recent readings in the log

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use forecast_lib::{
    parse::CsvLayout,
    predictor::{DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD},
    tailer::LogTailer,
    training::DEFAULT_LOG_PATH,
    AlertLevel, Reading,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::output::{print_info, print_table, FieldRow, OutputFormat};

/// Arguments for `pulse stats`
#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Structured heart-rate log
    #[arg(long = "log", env = "PULSE_LOG_PATH", default_value = DEFAULT_LOG_PATH)]
    pub log_path: PathBuf,

    /// Number of recent readings to summarise
    #[arg(long, default_value_t = 60)]
    pub window: usize,

    /// Readings below this are LOW
    #[arg(long, default_value_t = DEFAULT_LOW_THRESHOLD)]
    pub low: f64,

    /// Readings above this are HIGH
    #[arg(long, default_value_t = DEFAULT_HIGH_THRESHOLD)]
    pub high: f64,

    /// Keep following the log and print a summary every interval
    #[arg(long)]
    pub watch: bool,

    /// Delay between summaries in watch mode
    #[arg(long, default_value_t = 2000)]
    pub interval_ms: u64,
}

/// Summary of the newest `window` readings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStats {
    pub readings: usize,
    pub average: f64,
    pub min: u32,
    pub max: u32,
    pub latest: Reading,
    pub classification: AlertLevel,
}

impl WindowStats {
    /// `None` when there is nothing to summarise
    pub fn compute<'a, I>(readings: I, low: f64, high: f64) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Reading>,
    {
        let mut iter = readings.into_iter();
        let first = iter.next()?;
        let mut stats = Self {
            readings: 1,
            average: 0.0,
            min: first.heart_rate,
            max: first.heart_rate,
            latest: first.clone(),
            classification: AlertLevel::Normal,
        };
        let mut sum = u64::from(first.heart_rate);
        for reading in iter {
            stats.readings += 1;
            stats.min = stats.min.min(reading.heart_rate);
            stats.max = stats.max.max(reading.heart_rate);
            sum += u64::from(reading.heart_rate);
            stats.latest = reading.clone();
        }
        stats.average = sum as f64 / stats.readings as f64;
        stats.classification = AlertLevel::classify(f64::from(stats.latest.heart_rate), low, high);
        Some(stats)
    }
}

/// The newest readings seen in the log, oldest first
#[derive(Debug)]
struct RecentReadings {
    layout: CsvLayout,
    window: VecDeque<Reading>,
    size: usize,
    malformed: u64,
}

impl RecentReadings {
    fn new(size: usize) -> Self {
        Self {
            layout: CsvLayout::default(),
            window: VecDeque::with_capacity(size),
            size,
            malformed: 0,
        }
    }

    fn absorb(&mut self, lines: &[String]) {
        for line in lines {
            if let Some(layout) = CsvLayout::from_header(line) {
                self.layout = layout;
                continue;
            }
            match self.layout.parse(line) {
                Ok(reading) => {
                    if self.window.len() == self.size {
                        self.window.pop_front();
                    }
                    self.window.push_back(reading);
                }
                Err(e) => {
                    self.malformed += 1;
                    debug!(error = %e, "Skipping malformed line");
                }
            }
        }
    }

    /// A rotated log starts a fresh window, like rereading the new file
    fn reset(&mut self) {
        self.layout = CsvLayout::default();
        self.window.clear();
    }
}

/// JSON shape of one summary
#[derive(Debug, Serialize)]
struct StatsReport<'a> {
    log: &'a PathBuf,
    window: usize,
    malformed: u64,
    stats: Option<WindowStats>,
}

/// Summarise the log once, or repeatedly with `--watch`
pub fn run(args: &StatsArgs, format: OutputFormat) -> Result<()> {
    if args.window == 0 {
        bail!("--window must be at least 1");
    }
    if !(args.low <= args.high) {
        bail!("--low {} exceeds --high {}", args.low, args.high);
    }

    let mut tailer = LogTailer::new(&args.log_path);
    let mut recent = RecentReadings::new(args.window);
    loop {
        catch_up(&mut tailer, &mut recent)?;
        let stats = WindowStats::compute(&recent.window, args.low, args.high);
        report(args, &recent, stats, format)?;

        if !args.watch {
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(args.interval_ms.max(1)));
    }
}

fn catch_up(tailer: &mut LogTailer, recent: &mut RecentReadings) -> Result<()> {
    loop {
        let batch = tailer
            .poll()
            .with_context(|| format!("Failed to read {}", tailer.path().display()))?;
        if batch.rotated {
            recent.reset();
        }
        recent.malformed += batch.oversized;
        recent.absorb(&batch.lines);
        if !batch.file_present || batch.caught_up {
            return Ok(());
        }
    }
}

fn report(
    args: &StatsArgs,
    recent: &RecentReadings,
    stats: Option<WindowStats>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            // one compact object per summary so --watch output stays line-delimited
            let report = StatsReport {
                log: &args.log_path,
                window: args.window,
                malformed: recent.malformed,
                stats,
            };
            println!("{}", serde_json::to_string(&report)?);
            Ok(())
        }
        OutputFormat::Table => {
            let Some(stats) = stats else {
                print_info("No data yet.");
                return Ok(());
            };
            print_table(&[
                FieldRow::new("Readings", stats.readings),
                FieldRow::new("Average", format!("{:.1} bpm", stats.average)),
                FieldRow::new("Min", format!("{} bpm", stats.min)),
                FieldRow::new("Max", format!("{} bpm", stats.max)),
                FieldRow::new(
                    "Latest",
                    format!("{} bpm at {}", stats.latest.heart_rate, stats.latest.timestamp),
                ),
                FieldRow::new("Status", color_level(stats.classification)),
            ]);
            Ok(())
        }
    }
}

fn color_level(level: AlertLevel) -> String {
    match level {
        AlertLevel::Normal => level.as_str().green().to_string(),
        AlertLevel::Low | AlertLevel::High => level.as_str().red().bold().to_string(),
    }
}
