//! Outlier device detection
//!
//! Each device is reduced to one representative value per dimension (the mean
//! of its own readings, or its failure rate). Every dimension then gets a
//! population baseline across devices and each device is z-scored against it.
//! A device is an outlier when any dimension's |z| exceeds the threshold; it
//! appears once with every dimension that contributed.

use super::flag::{by_abs_z_desc, AnomalyFlag, SubjectKind, ThresholdRule};
use crate::config::AnalysisConfig;
use crate::error::InputError;
use crate::record::{Condition, RecordStore};
use crate::stats::{mean, Baseline, UndefinedReason};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Per-device measurement compared against the device population
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceDimension {
    Temperature,
    Voltage,
    Frequency,
    ExecutionTime,
    /// Share of the device's tests that failed
    FailureRate,
}

impl DeviceDimension {
    pub const ENVIRONMENTAL: [DeviceDimension; 3] = [
        DeviceDimension::Temperature,
        DeviceDimension::Voltage,
        DeviceDimension::Frequency,
    ];

    /// Reading the dimension averages, `None` for the failure rate
    pub fn condition(&self) -> Option<Condition> {
        match self {
            DeviceDimension::Temperature => Some(Condition::Temperature),
            DeviceDimension::Voltage => Some(Condition::Voltage),
            DeviceDimension::Frequency => Some(Condition::Frequency),
            DeviceDimension::ExecutionTime => Some(Condition::ExecutionTime),
            DeviceDimension::FailureRate => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self.condition() {
            Some(c) => c.as_str(),
            None => "failure_rate",
        }
    }
}

impl fmt::Display for DeviceDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score of one device on one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: DeviceDimension,
    pub flag: AnomalyFlag,
}

/// One scored device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub device_id: String,
    pub tests: usize,
    pub failures: usize,
    /// One score per configured dimension, in configuration order
    pub scores: Vec<DimensionScore>,
}

impl DeviceProfile {
    pub fn is_outlier(&self) -> bool {
        self.scores.iter().any(|s| s.flag.flagged)
    }

    /// Dimensions on which the device crossed the threshold
    pub fn contributing(&self) -> impl Iterator<Item = &DimensionScore> {
        self.scores.iter().filter(|s| s.flag.flagged)
    }

    /// Score with the largest |z|
    pub fn strongest(&self) -> Option<&DimensionScore> {
        self.scores
            .iter()
            .min_by(|a, b| by_abs_z_desc(&a.flag, &b.flag))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionBaseline {
    pub dimension: DeviceDimension,
    /// Absent with fewer than two scored devices
    pub baseline: Option<Baseline>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceOutlierReport {
    pub threshold: f64,
    pub min_tests: usize,
    pub baselines: Vec<DimensionBaseline>,
    /// Devices below `min_tests`, left unscored
    pub skipped_devices: usize,
    /// Ordered by strongest |z| descending, ties by device id
    pub devices: Vec<DeviceProfile>,
}

impl DeviceOutlierReport {
    pub fn outliers(&self) -> impl Iterator<Item = &DeviceProfile> {
        self.devices.iter().filter(|d| d.is_outlier())
    }
}

#[derive(Default)]
struct DeviceAccumulator {
    tests: usize,
    failures: usize,
    readings: BTreeMap<Condition, Vec<f64>>,
}

/// Population z-score detector over per-device means
#[derive(Debug, Clone)]
pub struct DeviceDetector {
    threshold: f64,
    dimensions: Vec<DeviceDimension>,
    min_tests: usize,
}

impl DeviceDetector {
    pub fn new(threshold: f64, dimensions: Vec<DeviceDimension>, min_tests: usize) -> Self {
        Self {
            threshold,
            dimensions,
            min_tests,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.device_threshold,
            config.device_dimensions.clone(),
            config.device_min_tests,
        )
    }

    fn representative(&self, acc: &DeviceAccumulator, dimension: DeviceDimension) -> f64 {
        match dimension.condition() {
            Some(condition) => acc
                .readings
                .get(&condition)
                .and_then(|v| mean(v))
                .unwrap_or(f64::NAN),
            None => acc.failures as f64 / acc.tests as f64,
        }
    }

    pub fn detect(&self, store: &RecordStore) -> Result<DeviceOutlierReport, InputError> {
        store.require_non_empty()?;

        let conditions: Vec<Condition> = self
            .dimensions
            .iter()
            .filter_map(DeviceDimension::condition)
            .collect();

        let mut devices: BTreeMap<&str, DeviceAccumulator> = BTreeMap::new();
        for (index, record) in store.records().iter().enumerate() {
            let device_id = store.require_device_id(index)?;
            let acc = devices.entry(device_id).or_default();
            acc.tests += 1;
            if record.failed {
                acc.failures += 1;
            }
            for condition in &conditions {
                let value = store.require_reading(index, *condition)?;
                acc.readings.entry(*condition).or_default().push(value);
            }
        }

        let total_devices = devices.len();
        let eligible: Vec<(&str, DeviceAccumulator)> = devices
            .into_iter()
            .filter(|(_, acc)| acc.tests >= self.min_tests)
            .collect();
        let skipped_devices = total_devices - eligible.len();

        // representative[d][i]: dimension d of eligible device i
        let representative: Vec<Vec<f64>> = self
            .dimensions
            .iter()
            .map(|dimension| {
                eligible
                    .iter()
                    .map(|(_, acc)| self.representative(acc, *dimension))
                    .collect()
            })
            .collect();

        let baselines: Vec<DimensionBaseline> = self
            .dimensions
            .iter()
            .zip(&representative)
            .map(|(dimension, values)| DimensionBaseline {
                dimension: *dimension,
                baseline: Baseline::from_samples(values),
            })
            .collect();

        let mut profiles: Vec<DeviceProfile> = eligible
            .iter()
            .enumerate()
            .map(|(i, (device_id, acc))| {
                let scores = baselines
                    .iter()
                    .zip(&representative)
                    .map(|(b, values)| DimensionScore {
                        dimension: b.dimension,
                        flag: AnomalyFlag::evaluate(
                            SubjectKind::Device,
                            *device_id,
                            values[i],
                            b.baseline.ok_or(UndefinedReason::InsufficientSamples {
                                needed: 2,
                                available: values.len(),
                            }),
                            self.threshold,
                            ThresholdRule::AbsExceeds,
                        ),
                    })
                    .collect();
                DeviceProfile {
                    device_id: device_id.to_string(),
                    tests: acc.tests,
                    failures: acc.failures,
                    scores,
                }
            })
            .collect();

        profiles.sort_by(|a, b| {
            let strongest = match (a.strongest(), b.strongest()) {
                (Some(x), Some(y)) => by_abs_z_desc(&x.flag, &y.flag),
                _ => std::cmp::Ordering::Equal,
            };
            strongest.then_with(|| a.device_id.cmp(&b.device_id))
        });

        let report = DeviceOutlierReport {
            threshold: self.threshold,
            min_tests: self.min_tests,
            baselines,
            skipped_devices,
            devices: profiles,
        };
        tracing::debug!(
            devices = report.devices.len(),
            skipped = skipped_devices,
            outliers = report.outliers().count(),
            "device outlier detection complete"
        );
        Ok(report)
    }
}
