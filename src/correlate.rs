//! Condition / failure correlation
//!
//! Point-biserial correlation between one numeric condition and the binary
//! outcome (fail = 1, pass = 0), computed independently per condition:
//!
//! ```text
//! r = (M_fail - M_pass) / s * sqrt(n_fail * n_pass / (n * (n - 1)))
//! ```
//!
//! where `s` is the sample standard deviation of the condition over all
//! records that carry it. This equals the Pearson coefficient against the 0/1
//! outcome. Records without the reading are left out and `sample_size` reports
//! how many were used.
//!
//! Significance is the two-tailed Student t test of `r` with n - 2 degrees
//! of freedom, significant below [`SIGNIFICANCE_LEVEL`].

use crate::error::InputError;
use crate::record::{Condition, RecordStore};
use crate::stats::{self, Statistic, UndefinedReason};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// p-value below which a correlation is reported as significant
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Qualitative strength of a coefficient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    /// |r| > 0.3
    Strong,
    /// 0.1 < |r| <= 0.3
    Moderate,
    /// |r| <= 0.1
    Weak,
}

impl Strength {
    pub fn of(r: f64) -> Self {
        let abs = r.abs();
        if abs > 0.3 {
            Strength::Strong
        } else if abs > 0.1 {
            Strength::Moderate
        } else {
            Strength::Weak
        }
    }
}

/// Association between one condition and failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub condition: Condition,
    /// In [-1, 1] when defined
    pub coefficient: Statistic,
    /// Records carrying this condition
    pub sample_size: usize,
    pub failing: usize,
    pub passing: usize,
    pub mean_failing: Statistic,
    pub mean_passing: Statistic,
    /// `r * sqrt((n - 2) / (1 - r^2))`, Student t with n - 2 degrees of freedom
    pub t_statistic: Statistic,
    /// Two-tailed p-value of `t_statistic`
    pub p_value: Statistic,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub significant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<Strength>,
}

/// Correlate one condition with the failure outcome
pub fn correlate(store: &RecordStore, condition: Condition) -> Result<CorrelationResult, InputError> {
    let mut values = Vec::with_capacity(store.len());
    let mut failing = Vec::new();
    let mut passing = Vec::new();

    for (index, record) in store.records().iter().enumerate() {
        let Some(value) = store.optional_reading(index, condition)? else {
            continue;
        };
        values.push(value);
        if record.failed {
            failing.push(value);
        } else {
            passing.push(value);
        }
    }

    let mean_of = |group: &[f64]| {
        stats::mean(group)
            .map(Statistic::value)
            .unwrap_or(Statistic::undefined(UndefinedReason::EmptyGroup))
    };

    let coefficient = point_biserial(&values, &failing, &passing);
    let (t_statistic, p_value) = match coefficient.as_value() {
        Some(r) => (t_statistic(r, values.len()), p_value(r, values.len())),
        None => (coefficient, coefficient),
    };

    Ok(CorrelationResult {
        condition,
        strength: coefficient.as_value().map(Strength::of),
        coefficient,
        sample_size: values.len(),
        failing: failing.len(),
        passing: passing.len(),
        mean_failing: mean_of(&failing),
        mean_passing: mean_of(&passing),
        t_statistic,
        significant: p_value.as_value().map(|p| p < SIGNIFICANCE_LEVEL),
        p_value,
    })
}

/// Correlate each condition in turn, in the given order
pub fn correlate_all(
    store: &RecordStore,
    conditions: &[Condition],
) -> Result<Vec<CorrelationResult>, InputError> {
    store.require_non_empty()?;
    conditions.iter().map(|c| correlate(store, *c)).collect()
}

fn point_biserial(values: &[f64], failing: &[f64], passing: &[f64]) -> Statistic {
    if failing.is_empty() || passing.is_empty() {
        return Statistic::undefined(UndefinedReason::EmptyGroup);
    }
    let Some(s) = stats::sample_std_dev(values) else {
        return Statistic::undefined(UndefinedReason::InsufficientSamples {
            needed: 2,
            available: values.len(),
        });
    };
    if s == 0.0 {
        return Statistic::undefined(UndefinedReason::ZeroVariance);
    }

    let (Some(m1), Some(m0)) = (stats::mean(failing), stats::mean(passing)) else {
        return Statistic::undefined(UndefinedReason::EmptyGroup);
    };
    let n = values.len() as f64;
    let n1 = failing.len() as f64;
    let n0 = passing.len() as f64;
    let r = (m1 - m0) / s * (n1 * n0 / (n * (n - 1.0))).sqrt();
    Statistic::value(r.clamp(-1.0, 1.0))
}

fn t_statistic(r: f64, n: usize) -> Statistic {
    if n < 3 {
        return Statistic::undefined(UndefinedReason::InsufficientSamples {
            needed: 3,
            available: n,
        });
    }
    let residual = 1.0 - r * r;
    if residual <= 0.0 {
        return Statistic::undefined(UndefinedReason::ZeroVariance);
    }
    Statistic::value(r * ((n - 2) as f64 / residual).sqrt())
}

fn p_value(r: f64, n: usize) -> Statistic {
    let t = match t_statistic(r, n) {
        Statistic::Value { value } => value,
        // |r| = 1: the t statistic is unbounded
        Statistic::Undefined {
            reason: UndefinedReason::ZeroVariance,
        } => return Statistic::value(0.0),
        undefined => return undefined,
    };
    match StudentsT::new(0.0, 1.0, (n - 2) as f64) {
        Ok(dist) => Statistic::value((2.0 * dist.sf(t.abs())).min(1.0)),
        Err(_) => Statistic::undefined(UndefinedReason::InsufficientSamples {
            needed: 3,
            available: n,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::{fail, pass};
    use crate::record::TestRecord;

    fn with_temp(mut r: TestRecord, t: f64) -> TestRecord {
        r.temperature = Some(t);
        r
    }

    #[test]
    fn test_hot_failures_correlate_positively() {
        let store = RecordStore::new(vec![
            with_temp(pass("D1", "B1", (2025, 1, 1)), 40.0),
            with_temp(pass("D2", "B1", (2025, 1, 1)), 45.0),
            with_temp(pass("D3", "B1", (2025, 1, 1)), 50.0),
            with_temp(fail("D4", "B1", (2025, 1, 1), "ERR_B01"), 95.0),
            with_temp(fail("D5", "B1", (2025, 1, 1), "ERR_B01"), 100.0),
        ]);
        let result = correlate(&store, Condition::Temperature).unwrap();
        let r = result.coefficient.as_value().unwrap();
        assert!(r > 0.9 && r <= 1.0, "r = {r}");
        assert_eq!(result.strength, Some(Strength::Strong));
        assert_eq!(result.sample_size, 5);
        assert_eq!(result.failing, 2);
    }

    #[test]
    fn test_matches_pearson_against_binary_outcome() {
        let temps = [20.0, 35.0, 50.0, 65.0, 80.0, 95.0];
        let outcome = [false, false, true, false, true, true];
        let records: Vec<TestRecord> = temps
            .iter()
            .zip(outcome)
            .map(|(t, failed)| {
                let r = if failed {
                    fail("D", "B", (2025, 1, 1), "ERR_T01")
                } else {
                    pass("D", "B", (2025, 1, 1))
                };
                with_temp(r, *t)
            })
            .collect();
        let store = RecordStore::new(records);
        let r = correlate(&store, Condition::Temperature)
            .unwrap()
            .coefficient
            .as_value()
            .unwrap();

        let ys: Vec<f64> = outcome.iter().map(|f| if *f { 1.0 } else { 0.0 }).collect();
        let mx = stats::mean(&temps).unwrap();
        let my = stats::mean(&ys).unwrap();
        let cov: f64 = temps.iter().zip(&ys).map(|(x, y)| (x - mx) * (y - my)).sum();
        let sx: f64 = temps.iter().map(|x| (x - mx).powi(2)).sum::<f64>().sqrt();
        let sy: f64 = ys.iter().map(|y| (y - my).powi(2)).sum::<f64>().sqrt();
        assert!((r - cov / (sx * sy)).abs() < 1e-12);
    }

    #[test]
    fn test_no_failures_is_undefined_not_zero() {
        let store = RecordStore::new(vec![
            with_temp(pass("D1", "B1", (2025, 1, 1)), 40.0),
            with_temp(pass("D2", "B1", (2025, 1, 1)), 60.0),
        ]);
        let result = correlate(&store, Condition::Temperature).unwrap();
        assert_eq!(
            result.coefficient,
            Statistic::undefined(UndefinedReason::EmptyGroup)
        );
        assert_eq!(result.strength, None);
        assert!(result.t_statistic.is_undefined());
    }

    #[test]
    fn test_constant_condition_is_undefined() {
        let store = RecordStore::new(vec![
            pass("D1", "B1", (2025, 1, 1)),
            pass("D2", "B1", (2025, 1, 1)),
            fail("D3", "B1", (2025, 1, 1), "ERR_T01"),
        ]);
        // Fixtures share voltage 1.05
        let result = correlate(&store, Condition::Voltage).unwrap();
        assert_eq!(
            result.coefficient,
            Statistic::undefined(UndefinedReason::ZeroVariance)
        );
    }

    #[test]
    fn test_missing_readings_reduce_sample_size() {
        let mut missing = pass("D9", "B1", (2025, 1, 1));
        missing.frequency = None;
        let store = RecordStore::new(vec![
            missing,
            pass("D1", "B1", (2025, 1, 1)),
            fail("D2", "B1", (2025, 1, 1), "ERR_T01"),
        ]);
        let result = correlate(&store, Condition::Frequency).unwrap();
        assert_eq!(result.sample_size, 2);
    }

    #[test]
    fn test_nan_reading_is_an_input_error() {
        let mut bad = fail("D2", "B1", (2025, 1, 1), "ERR_T01");
        bad.voltage = Some(f64::NAN);
        let store = RecordStore::new(vec![pass("D1", "B1", (2025, 1, 1)), bad]);
        assert!(matches!(
            correlate(&store, Condition::Voltage),
            Err(InputError::NonFinite { index: 1, .. })
        ));
    }

    #[test]
    fn test_p_value_two_tailed() {
        let p = p_value(0.5, 20).as_value().unwrap();
        assert!((p - 0.02477).abs() < 1e-4, "p = {p}");
        assert_eq!(p_value(-0.5, 20), p_value(0.5, 20));

        let weak = p_value(0.1, 10).as_value().unwrap();
        assert!((weak - 0.7834).abs() < 1e-3, "p = {weak}");
        assert!((p_value(0.0, 10).as_value().unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_p_value_edge_cases() {
        assert_eq!(p_value(1.0, 5).as_value(), Some(0.0));
        assert_eq!(
            p_value(0.5, 2),
            Statistic::undefined(UndefinedReason::InsufficientSamples {
                needed: 3,
                available: 2
            })
        );
    }

    #[test]
    fn test_significance_follows_p_value() {
        let mut records = Vec::new();
        for i in 0..30 {
            let hot = i % 3 == 0;
            let r = if hot {
                fail("D", "B1", (2025, 1, 1), "ERR_T01")
            } else {
                pass("D", "B1", (2025, 1, 1))
            };
            let base = if hot { 90.0 } else { 45.0 };
            records.push(with_temp(r, base + i as f64 * 0.1));
        }
        let result = correlate(&RecordStore::new(records), Condition::Temperature).unwrap();
        let p = result.p_value.as_value().unwrap();
        assert!(p < SIGNIFICANCE_LEVEL, "p = {p}");
        assert_eq!(result.significant, Some(true));

        // Fixtures share voltage 1.05
        let flat = correlate(
            &RecordStore::new(vec![
                pass("D1", "B1", (2025, 1, 1)),
                fail("D2", "B1", (2025, 1, 1), "ERR_T01"),
            ]),
            Condition::Voltage,
        )
        .unwrap();
        assert!(flat.p_value.is_undefined());
        assert_eq!(flat.significant, None);
    }

    #[test]
    fn test_strength_bands() {
        assert_eq!(Strength::of(0.35), Strength::Strong);
        assert_eq!(Strength::of(-0.2), Strength::Moderate);
        assert_eq!(Strength::of(0.05), Strength::Weak);
    }
}
