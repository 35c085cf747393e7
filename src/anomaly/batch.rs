//! Batch-level anomaly detection
//!
//! Per-batch failure rates form the sample; each batch is z-scored against the
//! mean and sample standard deviation of that sample. Batches below the
//! minimum record count are kept out of the baseline because their rates are
//! too noisy, but they are still scored and reported as low-confidence.

use super::flag::{by_abs_z_desc, AnomalyFlag, SubjectKind, ThresholdRule};
use crate::categorize::FailureCategory;
use crate::config::AnalysisConfig;
use crate::error::InputError;
use crate::record::{batch_order, RecordStore};
use crate::stats::Baseline;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which batches contribute to the baseline a batch is scored against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchBaseline {
    /// One baseline over every eligible batch, the scored batch included
    Pooled,
    /// Each batch is scored against the eligible batches other than itself
    LeaveOneOut,
}

/// Aggregate counts for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub batch_id: String,
    pub records: usize,
    pub failures: usize,
    pub failure_rate: f64,
    /// Failures per category; failing records without an error code are not counted
    pub categories: BTreeMap<FailureCategory, usize>,
}

/// One batch with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAnomaly {
    pub stats: BatchStats,
    /// Fewer records than the configured minimum; excluded from the baseline
    pub low_confidence: bool,
    pub flag: AnomalyFlag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAnomalyReport {
    pub threshold: f64,
    pub min_records: usize,
    pub baseline_mode: BatchBaseline,
    /// Baseline over all eligible batches (absent with fewer than two)
    pub population: Option<Baseline>,
    /// Ordered by |z| descending, undefined scores last, ties by batch id
    pub batches: Vec<BatchAnomaly>,
}

impl BatchAnomalyReport {
    pub fn flagged(&self) -> impl Iterator<Item = &BatchAnomaly> {
        self.batches.iter().filter(|b| b.flag.flagged)
    }

    pub fn low_confidence(&self) -> impl Iterator<Item = &BatchAnomaly> {
        self.batches.iter().filter(|b| b.low_confidence)
    }
}

/// Batch anomaly detector
#[derive(Debug, Clone)]
pub struct BatchDetector {
    threshold: f64,
    min_records: usize,
    baseline: BatchBaseline,
}

impl BatchDetector {
    /// # Arguments
    /// * `threshold` - |z| at or above which a batch is flagged (default: 3.0)
    /// * `min_records` - batches below this size are low-confidence (default: 30)
    pub fn new(threshold: f64, min_records: usize, baseline: BatchBaseline) -> Self {
        Self {
            threshold,
            min_records,
            baseline,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.batch_threshold,
            config.batch_min_records,
            config.batch_baseline,
        )
    }

    /// Aggregate records per batch, in batch order
    pub fn batch_stats(
        store: &RecordStore,
        categories: &[Option<FailureCategory>],
    ) -> Result<Vec<BatchStats>, InputError> {
        store.require_non_empty()?;

        let mut groups: BTreeMap<&str, BatchStats> = BTreeMap::new();
        for (index, record) in store.records().iter().enumerate() {
            let batch_id = store.require_batch_id(index)?;
            let entry = groups.entry(batch_id).or_insert_with(|| BatchStats {
                batch_id: batch_id.to_string(),
                records: 0,
                failures: 0,
                failure_rate: 0.0,
                categories: BTreeMap::new(),
            });
            entry.records += 1;
            if record.failed {
                entry.failures += 1;
                if let Some(Some(category)) = categories.get(index) {
                    *entry.categories.entry(*category).or_default() += 1;
                }
            }
        }

        let mut stats: Vec<BatchStats> = groups
            .into_values()
            .map(|mut s| {
                s.failure_rate = s.failures as f64 / s.records as f64;
                s
            })
            .collect();
        stats.sort_by(|a, b| batch_order(&a.batch_id, &b.batch_id));
        Ok(stats)
    }

    /// Score every batch against the batch population
    pub fn detect(
        &self,
        store: &RecordStore,
        categories: &[Option<FailureCategory>],
    ) -> Result<BatchAnomalyReport, InputError> {
        let stats = Self::batch_stats(store, categories)?;

        let eligible: Vec<(usize, f64)> = stats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.records >= self.min_records)
            .map(|(i, s)| (i, s.failure_rate))
            .collect();
        let eligible_rates: Vec<f64> = eligible.iter().map(|(_, r)| *r).collect();
        let population = Baseline::try_from_samples(&eligible_rates);

        let mut batches: Vec<BatchAnomaly> = stats
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let baseline = match self.baseline {
                    BatchBaseline::Pooled => population,
                    BatchBaseline::LeaveOneOut => {
                        let others: Vec<f64> = eligible
                            .iter()
                            .filter(|(j, _)| *j != i)
                            .map(|(_, r)| *r)
                            .collect();
                        Baseline::try_from_samples(&others)
                    }
                };
                let flag = AnomalyFlag::evaluate(
                    SubjectKind::Batch,
                    s.batch_id.clone(),
                    s.failure_rate,
                    baseline,
                    self.threshold,
                    ThresholdRule::AbsAtLeast,
                );
                BatchAnomaly {
                    low_confidence: s.records < self.min_records,
                    stats: s,
                    flag,
                }
            })
            .collect();

        batches.sort_by(|a, b| {
            by_abs_z_desc(&a.flag, &b.flag)
                .then_with(|| batch_order(&a.stats.batch_id, &b.stats.batch_id))
        });

        let flagged = batches.iter().filter(|b| b.flag.flagged).count();
        tracing::debug!(
            batches = batches.len(),
            eligible = eligible_rates.len(),
            flagged,
            "batch anomaly detection complete"
        );

        Ok(BatchAnomalyReport {
            threshold: self.threshold,
            min_records: self.min_records,
            baseline_mode: self.baseline,
            population: population.ok(),
            batches,
        })
    }
}
