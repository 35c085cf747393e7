//! CLI argument parsing for yieldlens

use crate::config::AnalysisConfig;
use crate::output::csv::CsvTable;
use crate::output::OutputFormat;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Starting configuration before a config file and flags are applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    #[default]
    Default,
    /// Tighter thresholds, fewer findings
    Strict,
    /// Looser thresholds for early warning
    Permissive,
}

impl Preset {
    pub fn config(self) -> AnalysisConfig {
        match self {
            Preset::Default => AnalysisConfig::default(),
            Preset::Strict => AnalysisConfig::strict(),
            Preset::Permissive => AnalysisConfig::permissive(),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "yieldlens")]
#[command(version)]
#[command(about = "Failure analysis and anomaly detection for semiconductor test logs", long_about = None)]
pub struct Cli {
    /// Test records to analyze (.csv or .json)
    #[arg(value_name = "INPUT", required_unless_present = "generate")]
    pub input: Option<PathBuf>,

    /// Write a synthetic test log to PATH instead of analyzing
    #[arg(long = "generate", value_name = "PATH", conflicts_with = "input")]
    pub generate: Option<PathBuf>,

    /// Seed for the synthetic generator
    #[arg(long = "seed", value_name = "SEED", default_value = "42")]
    pub seed: u64,

    /// Analysis configuration file (TOML); replaces the preset
    #[arg(long = "config", value_name = "TOML")]
    pub config: Option<PathBuf>,

    /// Threshold preset used when no config file is given
    #[arg(long = "preset", value_enum, default_value = "default")]
    pub preset: Preset,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Table written by --format csv
    #[arg(long = "csv-table", value_enum, default_value = "daily")]
    pub csv_table: CsvTable,

    /// Write the report to PATH instead of stdout
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// |z| at or above which a batch is anomalous
    #[arg(long = "batch-threshold", value_name = "Z")]
    pub batch_threshold: Option<f64>,

    /// Records below which a batch is low-confidence
    #[arg(long = "min-batch-records", value_name = "N")]
    pub min_batch_records: Option<usize>,

    /// Trailing days in the daily spike baseline
    #[arg(long = "temporal-window", value_name = "DAYS")]
    pub temporal_window: Option<usize>,

    /// Standard deviations above the trailing mean that mark a spike
    #[arg(long = "temporal-threshold", value_name = "Z")]
    pub temporal_threshold: Option<f64>,

    /// |z| above which a device is an outlier
    #[arg(long = "device-threshold", value_name = "Z")]
    pub device_threshold: Option<f64>,

    /// Daily rolling-average window in days (repeatable)
    #[arg(long = "rolling-window", value_name = "DAYS")]
    pub rolling_window: Vec<usize>,

    /// Include the SHA-256 fingerprint of the findings
    #[arg(long = "fingerprint")]
    pub fingerprint: bool,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of `config`
    pub fn apply(&self, mut config: AnalysisConfig) -> AnalysisConfig {
        if let Some(t) = self.batch_threshold {
            config.batch_threshold = t;
        }
        if let Some(n) = self.min_batch_records {
            config.batch_min_records = n;
        }
        if let Some(w) = self.temporal_window {
            config.temporal_window = w;
        }
        if let Some(t) = self.temporal_threshold {
            config.temporal_threshold = t;
        }
        if let Some(t) = self.device_threshold {
            config.device_threshold = t;
        }
        if !self.rolling_window.is_empty() {
            config.rolling_windows = self.rolling_window.clone();
        }
        config
    }
}
