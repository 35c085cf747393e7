//! Analysis configuration
//!
//! Every tunable the analysis uses is an explicit field here; nothing is read
//! from the environment. A configuration is validated once before a run and an
//! invalid one refuses the run outright (see [`ConfigError`]).

use crate::anomaly::{BatchBaseline, DeviceDimension};
use crate::categorize::CategoryTable;
use crate::error::ConfigError;
use crate::record::Condition;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Bin edges for the per-condition failure-rate breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinConfig {
    pub temperature: Vec<f64>,
    pub voltage: Vec<f64>,
    pub frequency: Vec<f64>,
    pub execution_time: Vec<f64>,
}

impl Default for BinConfig {
    fn default() -> Self {
        Self {
            temperature: (2..=12).map(|i| f64::from(i) * 10.0).collect(),
            voltage: (7..=15).map(|i| f64::from(i) / 10.0).collect(),
            frequency: (2..=7).map(|i| f64::from(i) / 2.0).collect(),
            execution_time: (0..=7).map(|i| f64::from(i) * 50.0).collect(),
        }
    }
}

impl BinConfig {
    pub fn edges(&self, condition: Condition) -> &[f64] {
        match condition {
            Condition::Temperature => &self.temperature,
            Condition::Voltage => &self.voltage,
            Condition::Frequency => &self.frequency,
            Condition::ExecutionTime => &self.execution_time,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for condition in Condition::ALL {
            let edges = self.edges(condition);
            let increasing = edges.windows(2).all(|w| w[0] < w[1]);
            if edges.len() < 2 || !increasing || edges.iter().any(|e| !e.is_finite()) {
                return Err(ConfigError::InvalidBins {
                    condition: condition.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Configuration for one analysis run
///
/// # Example
/// ```
/// use yieldlens::config::AnalysisConfig;
///
/// let config = AnalysisConfig::default();
/// assert_eq!(config.batch_threshold, 3.0);
/// assert_eq!(config.temporal_window, 7);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Error code → failure category lookup
    #[serde(rename = "category_map")]
    pub category_table: CategoryTable,

    /// |z| at or above which a batch is flagged
    pub batch_threshold: f64,

    /// Batches with fewer records are reported as low-confidence and left
    /// out of the baseline
    pub batch_min_records: usize,

    /// Whether a batch's own rate takes part in the baseline it is scored against
    pub batch_baseline: BatchBaseline,

    /// Trailing days in the daily failure-count baseline
    pub temporal_window: usize,

    /// Standard deviations above the trailing mean that mark a spike
    pub temporal_threshold: f64,

    /// |z| above which a device dimension is an outlier
    pub device_threshold: f64,

    /// Per-device measurements compared against the device population
    pub device_dimensions: Vec<DeviceDimension>,

    /// Devices with fewer tests are not scored
    pub device_min_tests: usize,

    /// Rolling-average window sizes for the daily trend, in days
    pub rolling_windows: Vec<usize>,

    /// Rolling-average window sizes for the weekly trend, in weeks
    pub weekly_rolling_windows: Vec<usize>,

    /// Batch-over-batch increase (percentage points) that raises an alert
    pub batch_delta_alert_pp: f64,

    /// Bin edges for the condition breakdown
    pub bins: BinConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            category_table: CategoryTable::default(),
            batch_threshold: 3.0,
            batch_min_records: 30,
            batch_baseline: BatchBaseline::Pooled,
            temporal_window: 7,
            temporal_threshold: 3.0,
            device_threshold: 3.0,
            device_dimensions: DeviceDimension::ENVIRONMENTAL.to_vec(),
            device_min_tests: 1,
            rolling_windows: vec![7, 14],
            weekly_rolling_windows: vec![4],
            batch_delta_alert_pp: 2.0,
            bins: BinConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Tighter thresholds: fewer, more certain findings
    pub fn strict() -> Self {
        Self {
            batch_threshold: 3.5,
            batch_min_records: 100,
            temporal_window: 14,
            temporal_threshold: 3.5,
            device_threshold: 3.5,
            device_min_tests: 5,
            batch_delta_alert_pp: 3.0,
            ..Self::default()
        }
    }

    /// Looser thresholds for early warning, at the cost of more false alarms
    pub fn permissive() -> Self {
        Self {
            batch_threshold: 2.5,
            batch_min_records: 10,
            temporal_threshold: 2.5,
            device_threshold: 2.5,
            batch_delta_alert_pp: 1.0,
            ..Self::default()
        }
    }

    /// Load from a TOML file; fields left out keep their defaults
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))
    }

    /// Parse TOML text; the category table is validated while parsing
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_threshold("batch_threshold", self.batch_threshold)?;
        check_threshold("temporal_threshold", self.temporal_threshold)?;
        check_threshold("device_threshold", self.device_threshold)?;
        check_threshold("batch_delta_alert_pp", self.batch_delta_alert_pp)?;

        check_minimum("batch_min_records", self.batch_min_records)?;
        check_minimum("device_min_tests", self.device_min_tests)?;

        if self.temporal_window == 0 {
            return Err(ConfigError::NonPositiveWindow {
                name: "temporal_window",
                value: 0,
            });
        }
        check_windows("rolling_windows", &self.rolling_windows)?;
        check_windows("weekly_rolling_windows", &self.weekly_rolling_windows)?;

        if self.device_dimensions.is_empty() {
            return Err(ConfigError::NoDeviceDimensions);
        }

        self.bins.validate()
    }
}

fn check_threshold(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { name, value })
    }
}

fn check_minimum(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(ConfigError::InvalidMinimum { name, value })
    }
}

fn check_windows(name: &'static str, windows: &[usize]) -> Result<(), ConfigError> {
    if windows.is_empty() {
        return Err(ConfigError::EmptyWindowList { name });
    }
    match windows.iter().find(|w| **w == 0) {
        Some(w) => Err(ConfigError::NonPositiveWindow { name, value: *w }),
        None => Ok(()),
    }
}
