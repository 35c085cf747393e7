//! Numeric building blocks shared by every analysis component
//!
//! All statistics are computed in `f64` over slices in their given order, so
//! identical inputs produce bit-identical outputs.
//!
//! [`Statistic`] is the tagged result used wherever a number may not exist:
//! callers must match on it and cannot mistake "not computable" for zero.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a statistic could not be computed (or is only partially supported)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UndefinedReason {
    /// One of the groups the formula needs has no members
    EmptyGroup,
    /// Every sample has the same value
    ZeroVariance,
    /// Fewer samples than the statistic needs
    InsufficientSamples { needed: usize, available: usize },
    /// A trailing window reaches before the start of the series
    InsufficientHistory { needed: usize, available: usize },
    /// First element of an ordered sequence has nothing to compare against
    NoPredecessor,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndefinedReason::EmptyGroup => write!(f, "empty group"),
            UndefinedReason::ZeroVariance => write!(f, "zero variance"),
            UndefinedReason::InsufficientSamples { needed, available } => {
                write!(f, "insufficient samples ({available}/{needed})")
            }
            UndefinedReason::InsufficientHistory { needed, available } => {
                write!(f, "partial window ({available}/{needed})")
            }
            UndefinedReason::NoPredecessor => write!(f, "no predecessor"),
        }
    }
}

/// A number that may be undefined or computed from incomplete support
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Statistic {
    Value {
        value: f64,
    },
    Undefined {
        #[serde(flatten)]
        reason: UndefinedReason,
    },
    Partial {
        value: f64,
        #[serde(flatten)]
        reason: UndefinedReason,
    },
}

impl Statistic {
    pub fn value(value: f64) -> Self {
        Statistic::Value { value }
    }

    pub fn undefined(reason: UndefinedReason) -> Self {
        Statistic::Undefined { reason }
    }

    pub fn partial(value: f64, reason: UndefinedReason) -> Self {
        Statistic::Partial { value, reason }
    }

    /// The fully-supported value, if any
    pub fn as_value(&self) -> Option<f64> {
        match self {
            Statistic::Value { value } => Some(*value),
            _ => None,
        }
    }

    /// Any computed number, including partial ones
    pub fn as_any_value(&self) -> Option<f64> {
        match self {
            Statistic::Value { value } | Statistic::Partial { value, .. } => Some(*value),
            Statistic::Undefined { .. } => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Statistic::Value { .. })
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Statistic::Partial { .. })
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Statistic::Undefined { .. })
    }

    pub fn reason(&self) -> Option<UndefinedReason> {
        match self {
            Statistic::Value { .. } => None,
            Statistic::Undefined { reason } | Statistic::Partial { reason, .. } => Some(*reason),
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = f.precision().unwrap_or(4);
        match self {
            Statistic::Value { value } => write!(f, "{:.*}", precision, value),
            Statistic::Undefined { reason } => write!(f, "undefined ({reason})"),
            Statistic::Partial { value, reason } => {
                write!(f, "{:.*} [{reason}]", precision, value)
            }
        }
    }
}

/// Arithmetic mean; `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Spread at or below this many ulps of the mean's magnitude is rounding residue
const SPREAD_ULPS: f64 = 8.0;

/// Sample standard deviation (n - 1 denominator); `None` for fewer than 2 values
///
/// Returns exactly `0.0` when the samples are identical or differ only by
/// rounding residue, e.g. means of the same readings summed in another order.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    if is_constant(values) {
        return Some(0.0);
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    let sd = (ss / (values.len() - 1) as f64).sqrt();
    if sd <= negligible_spread(m) {
        return Some(0.0);
    }
    Some(sd)
}

/// Largest spread around `mean` treated as zero variance
fn negligible_spread(mean: f64) -> f64 {
    SPREAD_ULPS * f64::EPSILON * mean.abs().max(1.0)
}

/// Whether every value equals the first one
pub fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        Some(first) => values.iter().all(|v| v == first),
        None => true,
    }
}

/// Mean and sample standard deviation of a reference distribution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub mean: f64,
    pub std_dev: f64,
    pub sample_size: usize,
}

impl Baseline {
    /// Build a baseline from samples; `None` when fewer than 2 samples exist
    pub fn from_samples(values: &[f64]) -> Option<Self> {
        Some(Self {
            mean: mean(values)?,
            std_dev: sample_std_dev(values)?,
            sample_size: values.len(),
        })
    }

    /// Like [`Baseline::from_samples`], naming how many samples were available
    pub fn try_from_samples(values: &[f64]) -> Result<Self, UndefinedReason> {
        Self::from_samples(values).ok_or(UndefinedReason::InsufficientSamples {
            needed: 2,
            available: values.len(),
        })
    }

    /// Z-score of `observed`; undefined when the baseline has no spread
    pub fn z_score(&self, observed: f64) -> Statistic {
        if self.std_dev > 0.0 {
            Statistic::value((observed - self.mean) / self.std_dev)
        } else {
            Statistic::undefined(UndefinedReason::ZeroVariance)
        }
    }
}

/// Failure rate as a fraction; undefined for an empty group
pub fn rate(failures: usize, total: usize) -> Statistic {
    if total == 0 {
        Statistic::undefined(UndefinedReason::EmptyGroup)
    } else {
        Statistic::value(failures as f64 / total as f64)
    }
}
