//! Z-score anomaly flag shared by the batch, day and device detectors

use crate::stats::{Baseline, Statistic, UndefinedReason};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a flag is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Batch,
    Day,
    Device,
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectKind::Batch => f.write_str("batch"),
            SubjectKind::Day => f.write_str("day"),
            SubjectKind::Device => f.write_str("device"),
        }
    }
}

/// Anomaly severity classification based on distance past the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    /// Within 1σ past the threshold
    Low,
    /// 1σ - 2σ past the threshold
    Medium,
    /// More than 2σ past the threshold
    High,
}

/// How the z-score is compared with the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdRule {
    /// |z| >= threshold
    AbsAtLeast,
    /// |z| > threshold
    AbsExceeds,
    /// z > threshold (upward deviations only)
    UpperExceeds,
}

impl ThresholdRule {
    fn crosses(&self, z: f64, threshold: f64) -> bool {
        match self {
            ThresholdRule::AbsAtLeast => z.abs() >= threshold,
            ThresholdRule::AbsExceeds => z.abs() > threshold,
            ThresholdRule::UpperExceeds => z > threshold,
        }
    }
}

/// Observed value scored against a reference distribution
///
/// `flagged` holds exactly when the baseline has a positive standard
/// deviation and the z-score crosses the threshold under the detector's rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub kind: SubjectKind,
    pub subject: String,
    pub observed: f64,
    /// Absent when too few samples existed to form a baseline
    pub baseline: Option<Baseline>,
    pub z_score: Statistic,
    pub flagged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<AnomalySeverity>,
}

impl AnomalyFlag {
    /// Score `observed` and decide whether it is anomalous
    ///
    /// `reference` is the baseline, or why none could be formed; that reason
    /// becomes the undefined z-score.
    pub fn evaluate(
        kind: SubjectKind,
        subject: impl Into<String>,
        observed: f64,
        reference: Result<Baseline, UndefinedReason>,
        threshold: f64,
        rule: ThresholdRule,
    ) -> Self {
        let z_score = match &reference {
            Ok(b) => b.z_score(observed),
            Err(reason) => Statistic::undefined(*reason),
        };
        let baseline = reference.ok();

        let flagged = z_score
            .as_value()
            .is_some_and(|z| rule.crosses(z, threshold));
        let severity = if flagged {
            z_score.as_value().map(|z| classify_severity(z, threshold))
        } else {
            None
        };

        Self {
            kind,
            subject: subject.into(),
            observed,
            baseline,
            z_score,
            flagged,
            severity,
        }
    }

    /// |z| for ordering; undefined scores sort last
    pub fn abs_z(&self) -> Option<f64> {
        self.z_score.as_value().map(f64::abs)
    }
}

/// Classify anomaly severity based on Z-score
pub fn classify_severity(z_score: f64, threshold: f64) -> AnomalySeverity {
    let abs_z = z_score.abs();
    if abs_z > threshold + 2.0 {
        AnomalySeverity::High
    } else if abs_z > threshold + 1.0 {
        AnomalySeverity::Medium
    } else {
        AnomalySeverity::Low
    }
}

/// Descending |z| with undefined scores last
pub(crate) fn by_abs_z_desc(a: &AnomalyFlag, b: &AnomalyFlag) -> std::cmp::Ordering {
    match (a.abs_z(), b.abs_z()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}
