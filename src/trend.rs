//! Failure-rate trends over days, ISO weeks and production batches
//!
//! Daily and weekly series cover the periods present in the data, in
//! chronological order. Each point carries one rolling average per configured
//! window; a point with less history than its window gets a partial average
//! over the days available, marked as such.

use crate::anomaly::BatchDetector;
use crate::config::AnalysisConfig;
use crate::error::InputError;
use crate::record::{IsoWeek, RecordStore, TestType};
use crate::stats::{mean, Statistic, UndefinedReason};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rolling mean of the failure rate over `window` periods ending at a point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingAverage {
    pub window: usize,
    pub value: Statistic,
}

/// Failure rate of one period (day or ISO week)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint<P> {
    pub period: P,
    pub total: usize,
    pub failures: usize,
    pub failure_rate: f64,
    pub rolling: Vec<RollingAverage>,
}

impl<P> TrendPoint<P> {
    pub fn rolling_for(&self, window: usize) -> Option<&Statistic> {
        self.rolling
            .iter()
            .find(|r| r.window == window)
            .map(|r| &r.value)
    }
}

/// Failure rate of one batch and its change from the preceding batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDelta {
    pub batch_id: String,
    pub records: usize,
    pub failures: usize,
    pub failure_rate: f64,
    /// Percentage-point change from the previous batch in production order
    pub delta_pp: Statistic,
    /// Increase of at least the configured alert delta
    pub alert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRate {
    pub week: IsoWeek,
    pub total: usize,
    pub failures: usize,
    pub failure_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestTypeTrend {
    pub test_type: TestType,
    pub weeks: Vec<WeeklyRate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub daily: Vec<TrendPoint<NaiveDate>>,
    pub weekly: Vec<TrendPoint<IsoWeek>>,
    pub batches: Vec<BatchDelta>,
    pub by_test_type: Vec<TestTypeTrend>,
}

impl TrendReport {
    pub fn batch_alerts(&self) -> impl Iterator<Item = &BatchDelta> {
        self.batches.iter().filter(|b| b.alert)
    }
}

/// Rolling means of `rates`, one per position
///
/// Position `i` averages `rates[i + 1 - window..=i]` once that many values
/// exist; before that it averages `rates[..=i]` and is marked partial.
pub fn rolling_average(rates: &[f64], window: usize) -> Vec<Statistic> {
    (0..rates.len())
        .map(|i| {
            let available = i + 1;
            if available >= window {
                match mean(&rates[available - window..available]) {
                    Some(m) => Statistic::value(m),
                    None => Statistic::undefined(UndefinedReason::EmptyGroup),
                }
            } else {
                let reason = UndefinedReason::InsufficientHistory {
                    needed: window,
                    available,
                };
                match mean(&rates[..available]) {
                    Some(m) => Statistic::partial(m, reason),
                    None => Statistic::undefined(reason),
                }
            }
        })
        .collect()
}

#[derive(Default)]
struct Tally {
    total: usize,
    failures: usize,
}

impl Tally {
    fn add(&mut self, failed: bool) {
        self.total += 1;
        if failed {
            self.failures += 1;
        }
    }

    fn rate(&self) -> f64 {
        self.failures as f64 / self.total as f64
    }
}

fn with_rolling<P: Copy>(tallies: &BTreeMap<P, Tally>, windows: &[usize]) -> Vec<TrendPoint<P>> {
    let rates: Vec<f64> = tallies.values().map(Tally::rate).collect();
    let averages: Vec<(usize, Vec<Statistic>)> = windows
        .iter()
        .map(|w| (*w, rolling_average(&rates, *w)))
        .collect();

    tallies
        .iter()
        .enumerate()
        .map(|(i, (period, tally))| TrendPoint {
            period: *period,
            total: tally.total,
            failures: tally.failures,
            failure_rate: rates[i],
            rolling: averages
                .iter()
                .map(|(window, values)| RollingAverage {
                    window: *window,
                    value: values[i],
                })
                .collect(),
        })
        .collect()
}

/// Rolling failure-rate trends and batch-over-batch comparison
#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    daily_windows: Vec<usize>,
    weekly_windows: Vec<usize>,
    delta_alert_pp: f64,
}

impl TrendAnalyzer {
    pub fn new(daily_windows: Vec<usize>, weekly_windows: Vec<usize>, delta_alert_pp: f64) -> Self {
        Self {
            daily_windows,
            weekly_windows,
            delta_alert_pp,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.rolling_windows.clone(),
            config.weekly_rolling_windows.clone(),
            config.batch_delta_alert_pp,
        )
    }

    pub fn analyze(&self, store: &RecordStore) -> Result<TrendReport, InputError> {
        store.require_non_empty()?;

        let mut daily: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
        let mut weekly: BTreeMap<IsoWeek, Tally> = BTreeMap::new();
        let mut per_test: BTreeMap<TestType, BTreeMap<IsoWeek, Tally>> = BTreeMap::new();

        for (index, record) in store.records().iter().enumerate() {
            let date = store.require_date(index)?;
            let week = IsoWeek::of(date);
            daily.entry(date).or_default().add(record.failed);
            weekly.entry(week).or_default().add(record.failed);
            per_test
                .entry(record.test_type)
                .or_default()
                .entry(week)
                .or_default()
                .add(record.failed);
        }

        let by_test_type = per_test
            .into_iter()
            .map(|(test_type, weeks)| TestTypeTrend {
                test_type,
                weeks: weeks
                    .into_iter()
                    .map(|(week, tally)| WeeklyRate {
                        week,
                        total: tally.total,
                        failures: tally.failures,
                        failure_rate: tally.rate(),
                    })
                    .collect(),
            })
            .collect();

        let report = TrendReport {
            daily: with_rolling(&daily, &self.daily_windows),
            weekly: with_rolling(&weekly, &self.weekly_windows),
            batches: self.batch_deltas(store)?,
            by_test_type,
        };
        tracing::debug!(
            days = report.daily.len(),
            weeks = report.weekly.len(),
            batch_alerts = report.batch_alerts().count(),
            "trend analysis complete"
        );
        Ok(report)
    }

    /// Batches in production order with their change from the predecessor
    pub fn batch_deltas(&self, store: &RecordStore) -> Result<Vec<BatchDelta>, InputError> {
        let stats = BatchDetector::batch_stats(store, &[])?;

        let mut previous: Option<f64> = None;
        Ok(stats
            .into_iter()
            .map(|s| {
                let delta_pp = match previous {
                    Some(prev) => Statistic::value((s.failure_rate - prev) * 100.0),
                    None => Statistic::undefined(UndefinedReason::NoPredecessor),
                };
                previous = Some(s.failure_rate);
                BatchDelta {
                    alert: delta_pp
                        .as_value()
                        .is_some_and(|d| d >= self.delta_alert_pp),
                    batch_id: s.batch_id,
                    records: s.records,
                    failures: s.failures,
                    failure_rate: s.failure_rate,
                    delta_pp,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::{fail, pass};
    use crate::record::TestRecord;

    #[test]
    fn test_full_window_is_mean_of_prior_days() {
        let rates = [0.02, 0.03, 0.01, 0.04, 0.02, 0.03, 0.05];
        let rolling = rolling_average(&rates, 7);

        let last = rolling[6].as_value().unwrap();
        assert!((last - 0.2 / 7.0).abs() < 1e-12);
        assert!((last - 0.028_571_428_571).abs() < 1e-9);
        assert!(rolling[..6].iter().all(Statistic::is_partial));
    }

    #[test]
    fn test_partial_window_marks_available_history() {
        let rolling = rolling_average(&[0.25, 0.75, 0.125], 7);
        assert_eq!(
            rolling[1],
            Statistic::partial(
                0.5,
                UndefinedReason::InsufficientHistory {
                    needed: 7,
                    available: 2
                }
            )
        );
    }

    #[test]
    fn test_window_slides() {
        let rolling = rolling_average(&[1.0, 2.0, 3.0, 4.0], 2);
        let values: Vec<Option<f64>> = rolling.iter().map(Statistic::as_value).collect();
        assert_eq!(values, vec![None, Some(1.5), Some(2.5), Some(3.5)]);
    }

    fn day(date: (i32, u32, u32), total: usize, failures: usize, batch: &str) -> Vec<TestRecord> {
        (0..total)
            .map(|i| {
                let device = format!("D{i}");
                if i < failures {
                    fail(&device, batch, date, "ERR_T01")
                } else {
                    pass(&device, batch, date)
                }
            })
            .collect()
    }

    #[test]
    fn test_daily_and_weekly_series() {
        let mut records = Vec::new();
        records.extend(day((2025, 1, 6), 10, 1, "Batch_1"));
        records.extend(day((2025, 1, 7), 10, 3, "Batch_1"));
        records.extend(day((2025, 1, 13), 20, 2, "Batch_2"));

        let analyzer = TrendAnalyzer::new(vec![2], vec![2], 2.0);
        let report = analyzer.analyze(&RecordStore::new(records)).unwrap();

        assert_eq!(report.daily.len(), 3);
        assert_eq!(report.daily[1].failure_rate, 0.3);
        assert!(report.daily[0].rolling_for(2).unwrap().is_partial());
        let two_day = report.daily[1].rolling_for(2).unwrap().as_value().unwrap();
        assert!((two_day - 0.2).abs() < 1e-12);

        assert_eq!(report.weekly.len(), 2);
        assert_eq!(report.weekly[0].period.to_string(), "2025-W02");
        assert_eq!(report.weekly[0].failures, 4);
        assert_eq!(report.weekly[0].total, 20);

        assert_eq!(report.by_test_type.len(), 1);
        assert_eq!(report.by_test_type[0].weeks.len(), 2);
    }

    #[test]
    fn test_batch_delta_in_production_order() {
        let mut records = Vec::new();
        records.extend(day((2025, 1, 1), 100, 2, "Batch_10"));
        records.extend(day((2025, 1, 1), 100, 3, "Batch_9"));
        records.extend(day((2025, 1, 1), 100, 8, "Batch_11"));

        let analyzer = TrendAnalyzer::new(vec![7], vec![4], 2.0);
        let deltas = analyzer.batch_deltas(&RecordStore::new(records)).unwrap();

        let order: Vec<&str> = deltas.iter().map(|d| d.batch_id.as_str()).collect();
        assert_eq!(order, vec!["Batch_9", "Batch_10", "Batch_11"]);

        assert_eq!(
            deltas[0].delta_pp,
            Statistic::undefined(UndefinedReason::NoPredecessor)
        );
        assert!((deltas[1].delta_pp.as_value().unwrap() + 1.0).abs() < 1e-9);
        assert!((deltas[2].delta_pp.as_value().unwrap() - 6.0).abs() < 1e-9);
        assert!(!deltas[1].alert);
        assert!(deltas[2].alert);
    }

    #[test]
    fn test_missing_timestamp_is_rejected() {
        let mut r = pass("D1", "B1", (2025, 1, 1));
        r.timestamp = None;
        let analyzer = TrendAnalyzer::new(vec![7], vec![4], 2.0);
        assert!(matches!(
            analyzer.analyze(&RecordStore::new(vec![r])),
            Err(InputError::MissingField {
                field: "timestamp",
                ..
            })
        ));
    }
}
