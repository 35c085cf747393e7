//! Daily failure-spike detection
//!
//! Failures are counted per calendar day over the full date span of the input
//! (days without failures count zero). Each day is compared with the mean and
//! sample standard deviation of the `window` days strictly before it, so a
//! spike never inflates its own baseline. The first `window` days lack that
//! history and are reported as not evaluated.

use super::flag::{AnomalyFlag, SubjectKind, ThresholdRule};
use crate::config::AnalysisConfig;
use crate::error::InputError;
use crate::record::RecordStore;
use crate::stats::{Baseline, UndefinedReason};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome for one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DayEvaluation {
    /// Not enough preceding days to form a baseline
    NotEvaluated { reason: UndefinedReason },
    Evaluated { flag: AnomalyFlag },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPoint {
    pub date: NaiveDate,
    pub failures: usize,
    pub evaluation: DayEvaluation,
}

impl DayPoint {
    pub fn is_evaluated(&self) -> bool {
        matches!(self.evaluation, DayEvaluation::Evaluated { .. })
    }

    pub fn is_spike(&self) -> bool {
        matches!(&self.evaluation, DayEvaluation::Evaluated { flag } if flag.flagged)
    }

    /// Trailing mean + k·σ, when the baseline exists
    pub fn upper_bound(&self, threshold: f64) -> Option<f64> {
        match &self.evaluation {
            DayEvaluation::Evaluated { flag } => flag
                .baseline
                .map(|b| b.mean + threshold * b.std_dev),
            DayEvaluation::NotEvaluated { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalAnomalyReport {
    pub window: usize,
    pub threshold: f64,
    /// Every calendar day from the first to the last record, in order
    pub days: Vec<DayPoint>,
}

impl TemporalAnomalyReport {
    pub fn spikes(&self) -> impl Iterator<Item = &DayPoint> {
        self.days.iter().filter(|d| d.is_spike())
    }

    pub fn not_evaluated(&self) -> usize {
        self.days.iter().filter(|d| !d.is_evaluated()).count()
    }
}

/// Trailing-window daily spike detector
#[derive(Debug, Clone)]
pub struct TemporalDetector {
    window: usize,
    threshold: f64,
}

impl TemporalDetector {
    /// # Arguments
    /// * `window` - Number of preceding days in each baseline (default: 7)
    /// * `threshold` - Standard deviations above the trailing mean (default: 3.0)
    pub fn new(window: usize, threshold: f64) -> Self {
        Self { window, threshold }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.temporal_window, config.temporal_threshold)
    }

    /// Failures per calendar day, zero-filled between the first and last record
    pub fn daily_failures(store: &RecordStore) -> Result<Vec<(NaiveDate, usize)>, InputError> {
        store.require_non_empty()?;

        let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
        for (index, record) in store.records().iter().enumerate() {
            let date = store.require_date(index)?;
            let count = counts.entry(date).or_default();
            if record.failed {
                *count += 1;
            }
        }

        let (Some(first), Some(last)) = (
            counts.keys().next().copied(),
            counts.keys().next_back().copied(),
        ) else {
            return Err(InputError::EmptyInput);
        };

        Ok(first
            .iter_days()
            .take_while(|d| *d <= last)
            .map(|d| (d, counts.get(&d).copied().unwrap_or(0)))
            .collect())
    }

    /// Evaluate a daily count series in order
    pub fn evaluate_series(&self, series: &[(NaiveDate, usize)]) -> Vec<DayPoint> {
        let counts: Vec<f64> = series.iter().map(|(_, c)| *c as f64).collect();

        series
            .iter()
            .enumerate()
            .map(|(i, (date, failures))| {
                let evaluation = if i < self.window {
                    DayEvaluation::NotEvaluated {
                        reason: UndefinedReason::InsufficientHistory {
                            needed: self.window,
                            available: i,
                        },
                    }
                } else {
                    let trailing = &counts[i - self.window..i];
                    DayEvaluation::Evaluated {
                        flag: AnomalyFlag::evaluate(
                            SubjectKind::Day,
                            date.to_string(),
                            counts[i],
                            Baseline::try_from_samples(trailing),
                            self.threshold,
                            ThresholdRule::UpperExceeds,
                        ),
                    }
                };
                DayPoint {
                    date: *date,
                    failures: *failures,
                    evaluation,
                }
            })
            .collect()
    }

    pub fn detect(&self, store: &RecordStore) -> Result<TemporalAnomalyReport, InputError> {
        let series = Self::daily_failures(store)?;
        let days = self.evaluate_series(&series);

        let report = TemporalAnomalyReport {
            window: self.window,
            threshold: self.threshold,
            days,
        };
        tracing::debug!(
            days = report.days.len(),
            spikes = report.spikes().count(),
            "temporal anomaly detection complete"
        );
        Ok(report)
    }
}
