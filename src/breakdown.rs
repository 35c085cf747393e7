//! Failure rate per test type and per condition range
//!
//! Condition ranges are right-closed intervals `(lo, hi]` built from
//! consecutive bin edges. Readings at or below the first edge or above the
//! last one are counted as out of range rather than forced into a bin.

use crate::config::BinConfig;
use crate::error::InputError;
use crate::record::{Condition, RecordStore, TestType};
use crate::stats::{self, Statistic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Failure rate of one test type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestTypeRate {
    pub test_type: TestType,
    pub total: usize,
    pub failures: usize,
    pub failure_rate: Statistic,
}

/// Failure rate of records whose reading falls in `(lower, upper]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinnedRate {
    pub lower: f64,
    pub upper: f64,
    pub total: usize,
    pub failures: usize,
    pub failure_rate: Statistic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionBreakdown {
    pub condition: Condition,
    pub bins: Vec<BinnedRate>,
    pub out_of_range: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownReport {
    /// Test types present in the input, in declaration order
    pub by_test_type: Vec<TestTypeRate>,
    pub by_condition: Vec<ConditionBreakdown>,
}

impl BreakdownReport {
    /// Test type with the highest failure rate (earliest type wins ties)
    pub fn worst_test_type(&self) -> Option<&TestTypeRate> {
        self.by_test_type.iter().fold(None, |best, candidate| {
            let Some(rate) = candidate.failure_rate.as_value() else {
                return best;
            };
            match best.and_then(|b: &TestTypeRate| b.failure_rate.as_value()) {
                Some(best_rate) if best_rate >= rate => best,
                _ => Some(candidate),
            }
        })
    }
}

/// Compute both breakdowns over the whole store
pub fn analyze(store: &RecordStore, bins: &BinConfig) -> Result<BreakdownReport, InputError> {
    store.require_non_empty()?;

    let mut by_type: BTreeMap<TestType, (usize, usize)> = BTreeMap::new();
    for record in store.records() {
        let entry = by_type.entry(record.test_type).or_default();
        entry.0 += 1;
        if record.failed {
            entry.1 += 1;
        }
    }
    let by_test_type = by_type
        .into_iter()
        .map(|(test_type, (total, failures))| TestTypeRate {
            test_type,
            total,
            failures,
            failure_rate: stats::rate(failures, total),
        })
        .collect();

    let by_condition = Condition::ALL
        .into_iter()
        .map(|condition| bin_condition(store, condition, bins.edges(condition)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BreakdownReport {
        by_test_type,
        by_condition,
    })
}

fn bin_condition(
    store: &RecordStore,
    condition: Condition,
    edges: &[f64],
) -> Result<ConditionBreakdown, InputError> {
    let bin_count = edges.len().saturating_sub(1);
    let mut counts = vec![(0usize, 0usize); bin_count];
    let mut out_of_range = 0;
    let mut missing = 0;

    for (index, record) in store.records().iter().enumerate() {
        let Some(value) = store.optional_reading(index, condition)? else {
            missing += 1;
            continue;
        };
        match bin_index(edges, value) {
            Some(i) => {
                counts[i].0 += 1;
                if record.failed {
                    counts[i].1 += 1;
                }
            }
            None => out_of_range += 1,
        }
    }

    let bins = edges
        .windows(2)
        .zip(counts)
        .map(|(pair, (total, failures))| BinnedRate {
            lower: pair[0],
            upper: pair[1],
            total,
            failures,
            failure_rate: stats::rate(failures, total),
        })
        .collect();

    Ok(ConditionBreakdown {
        condition,
        bins,
        out_of_range,
        missing,
    })
}

/// Index of the `(lo, hi]` bin containing `value`
fn bin_index(edges: &[f64], value: f64) -> Option<usize> {
    if edges.len() < 2 || value <= edges[0] || value > edges[edges.len() - 1] {
        return None;
    }
    // First edge >= value closes the containing bin
    let upper = edges.partition_point(|e| *e < value);
    Some(upper - 1)
}
