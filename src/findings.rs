//! Aggregated analysis output
//!
//! [`Findings`] is a pure merge of the component reports. Each slot holds
//! either the component's own report, untouched, or the reason it could not be
//! computed. Serialization goes through serde with BTreeMap/Vec-ordered data
//! only, so identical input always yields byte-identical JSON.

use crate::anomaly::{BatchAnomalyReport, DeviceOutlierReport, TemporalAnomalyReport};
use crate::breakdown::BreakdownReport;
use crate::categorize::CategoryReport;
use crate::correlate::CorrelationResult;
use crate::error::InputError;
use crate::record::StoreSummary;
use crate::trend::TrendReport;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Outcome of one analysis component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComponentResult<T> {
    Computed { result: T },
    CouldNotCompute { reason: String },
}

impl<T> ComponentResult<T> {
    pub fn computed(&self) -> Option<&T> {
        match self {
            ComponentResult::Computed { result } => Some(result),
            ComponentResult::CouldNotCompute { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            ComponentResult::Computed { .. } => None,
            ComponentResult::CouldNotCompute { reason } => Some(reason),
        }
    }
}

impl<T> From<Result<T, InputError>> for ComponentResult<T> {
    fn from(result: Result<T, InputError>) -> Self {
        match result {
            Ok(result) => ComponentResult::Computed { result },
            Err(e) => ComponentResult::CouldNotCompute {
                reason: e.to_string(),
            },
        }
    }
}

/// Key of each slot in [`Findings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    Categories,
    Correlations,
    Breakdowns,
    BatchAnomalies,
    DailyAnomalies,
    DeviceOutliers,
    Trends,
}

impl FindingKind {
    pub const ALL: [FindingKind; 7] = [
        FindingKind::Categories,
        FindingKind::Correlations,
        FindingKind::Breakdowns,
        FindingKind::BatchAnomalies,
        FindingKind::DailyAnomalies,
        FindingKind::DeviceOutliers,
        FindingKind::Trends,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::Categories => "categories",
            FindingKind::Correlations => "correlations",
            FindingKind::Breakdowns => "breakdowns",
            FindingKind::BatchAnomalies => "batch_anomalies",
            FindingKind::DailyAnomalies => "daily_anomalies",
            FindingKind::DeviceOutliers => "device_outliers",
            FindingKind::Trends => "trends",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    /// Format version identifier
    pub version: String,
    pub summary: StoreSummary,
    pub categories: ComponentResult<CategoryReport>,
    pub correlations: ComponentResult<Vec<CorrelationResult>>,
    pub breakdowns: ComponentResult<BreakdownReport>,
    pub batch_anomalies: ComponentResult<BatchAnomalyReport>,
    pub daily_anomalies: ComponentResult<TemporalAnomalyReport>,
    pub device_outliers: ComponentResult<DeviceOutlierReport>,
    pub trends: ComponentResult<TrendReport>,
}

impl Findings {
    /// Reason recorded for `kind`, if that component could not be computed
    pub fn failure(&self, kind: FindingKind) -> Option<&str> {
        match kind {
            FindingKind::Categories => self.categories.failure_reason(),
            FindingKind::Correlations => self.correlations.failure_reason(),
            FindingKind::Breakdowns => self.breakdowns.failure_reason(),
            FindingKind::BatchAnomalies => self.batch_anomalies.failure_reason(),
            FindingKind::DailyAnomalies => self.daily_anomalies.failure_reason(),
            FindingKind::DeviceOutliers => self.device_outliers.failure_reason(),
            FindingKind::Trends => self.trends.failure_reason(),
        }
    }

    /// Components that could not be computed, with their reasons
    pub fn failed_components(&self) -> Vec<(FindingKind, &str)> {
        FindingKind::ALL
            .iter()
            .filter_map(|kind| self.failure(*kind).map(|reason| (*kind, reason)))
            .collect()
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// SHA-256 of the compact JSON encoding, hex-encoded
    pub fn fingerprint(&self) -> anyhow::Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}
