//! Property-based tests for the analysis components
//!
//! Covers categorization, correlation, the three anomaly detectors and rolling
//! averages with generated inputs. Sized to run in a few seconds.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use yieldlens::anomaly::{
    AnomalyFlag, BatchBaseline, BatchDetector, DeviceDetector, DeviceDimension, SubjectKind,
    TemporalDetector, ThresholdRule,
};
use yieldlens::categorize::{Categorizer, CategoryTable, FailureCategory};
use yieldlens::correlate::correlate;
use yieldlens::record::{Condition, RecordStore, TestRecord, TestType};
use yieldlens::stats::{mean, Baseline};
use yieldlens::trend::rolling_average;

fn record(device: &str, batch: &str, day: i64, temperature: f64, failed: bool) -> TestRecord {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .unwrap();
    TestRecord {
        device_id: device.to_string(),
        batch_id: batch.to_string(),
        test_type: TestType::BurnIn,
        timestamp: Some(start + Duration::days(day)),
        temperature: Some(temperature),
        voltage: Some(1.05),
        frequency: Some(2.4),
        execution_time: Some(150.0),
        failed,
        error_code: failed.then(|| "ERR_B01".to_string()),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_unknown_codes_are_unknown(code in "[A-Z]{4}_[0-9]{3}") {
        // Table codes have a three-letter prefix, so none of these are mapped
        let table = CategoryTable::default();
        let mut categorizer = Categorizer::new(&table);
        prop_assert_eq!(categorizer.categorize(&code), FailureCategory::Unknown);
        prop_assert_eq!(categorizer.categorize(&code), FailureCategory::Unknown);
    }

    #[test]
    fn prop_known_codes_are_stable(index in 0usize..18) {
        let table = CategoryTable::default();
        let (code, category) = table.codes().nth(index).unwrap();
        let mut categorizer = Categorizer::new(&table);
        prop_assert_eq!(categorizer.categorize(code), category);
        prop_assert_eq!(table.lookup(code), category);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_correlation_bounded_or_undefined(
        samples in prop::collection::vec((20.0f64..120.0, any::<bool>()), 1..80),
    ) {
        let records: Vec<TestRecord> = samples
            .iter()
            .enumerate()
            .map(|(i, (t, failed))| record(&format!("D{i}"), "B1", 0, *t, *failed))
            .collect();
        let result = correlate(&RecordStore::new(records), Condition::Temperature).unwrap();

        prop_assert_eq!(result.sample_size, samples.len());
        match result.coefficient.as_value() {
            Some(r) => {
                prop_assert!((-1.0 - 1e-9..=1.0 + 1e-9).contains(&r));
                prop_assert!(result.strength.is_some());
            }
            None => {
                prop_assert!(result.coefficient.is_undefined());
                prop_assert!(result.strength.is_none());
            }
        }
    }

    #[test]
    fn prop_equal_batch_rates_never_flag(
        batches in 2usize..12,
        size in 1usize..20,
        failures_seed in 0usize..20,
    ) {
        let failures = failures_seed % (size + 1);
        let mut records = Vec::new();
        for b in 0..batches {
            for d in 0..size {
                let id = format!("B{b}_D{d}");
                records.push(record(&id, &format!("Batch_{b}"), 0, 65.0, d < failures));
            }
        }
        let store = RecordStore::new(records);
        let categories = vec![None; store.len()];

        for mode in [BatchBaseline::Pooled, BatchBaseline::LeaveOneOut] {
            let report = BatchDetector::new(3.0, 1, mode).detect(&store, &categories).unwrap();
            prop_assert_eq!(report.batches.len(), batches);
            prop_assert_eq!(report.flagged().count(), 0);
        }
    }

    #[test]
    fn prop_first_window_days_not_evaluated(
        counts in prop::collection::vec(0usize..50, 1..40),
        window in 1usize..10,
    ) {
        let start = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let series: Vec<(NaiveDate, usize)> = counts
            .iter()
            .enumerate()
            .map(|(i, c)| (start + Duration::days(i as i64), *c))
            .collect();
        let days = TemporalDetector::new(window, 3.0).evaluate_series(&series);

        prop_assert_eq!(days.len(), counts.len());
        for (i, day) in days.iter().enumerate() {
            prop_assert_eq!(day.is_evaluated(), i >= window);
            if !day.is_evaluated() {
                prop_assert!(!day.is_spike());
            }
        }
    }

    #[test]
    fn prop_full_window_is_plain_mean(
        rates in prop::collection::vec(0.0f64..1.0, 1..40),
        window in 1usize..10,
    ) {
        let rolling = rolling_average(&rates, window);
        prop_assert_eq!(rolling.len(), rates.len());
        for (i, value) in rolling.iter().enumerate() {
            if i + 1 >= window {
                let expected = mean(&rates[i + 1 - window..=i]).unwrap();
                prop_assert_eq!(value.as_value(), Some(expected));
            } else {
                prop_assert!(value.is_partial());
            }
        }
    }

    #[test]
    fn prop_flag_requires_spread(
        samples in prop::collection::vec(0.0f64..10.0, 0..20),
        observed in -50.0f64..50.0,
        threshold in 0.5f64..5.0,
    ) {
        let baseline = Baseline::try_from_samples(&samples);
        for rule in [ThresholdRule::AbsAtLeast, ThresholdRule::AbsExceeds, ThresholdRule::UpperExceeds] {
            let flag = AnomalyFlag::evaluate(SubjectKind::Batch, "B", observed, baseline, threshold, rule);
            if flag.flagged {
                let b = flag.baseline.unwrap();
                prop_assert!(b.std_dev > 0.0);
                prop_assert!(flag.severity.is_some());
            } else {
                prop_assert!(flag.severity.is_none());
            }
        }
    }

    #[test]
    fn prop_identical_devices_never_outliers(
        devices in 2usize..30,
        temperature in 20.0f64..120.0,
    ) {
        let records: Vec<TestRecord> = (0..devices)
            .map(|d| record(&format!("D{d}"), "B1", 0, temperature, false))
            .collect();
        let detector = DeviceDetector::new(3.0, DeviceDimension::ENVIRONMENTAL.to_vec(), 1);
        let report = detector.detect(&RecordStore::new(records)).unwrap();
        prop_assert_eq!(report.devices.len(), devices);
        prop_assert_eq!(report.outliers().count(), 0);
    }

    #[test]
    fn prop_reordered_readings_never_outliers(devices in 2usize..120) {
        // Every device averages 65.1; one sums its readings in another order
        let mut records = Vec::new();
        for d in 0..devices {
            for t in [65.1, 70.3, 59.9] {
                records.push(record(&format!("D{d:03}"), "B1", 0, t, false));
            }
        }
        for t in [65.1, 59.9, 70.3] {
            records.push(record("DEV_ZZZ", "B1", 0, t, false));
        }
        let detector = DeviceDetector::new(3.0, DeviceDimension::ENVIRONMENTAL.to_vec(), 1);
        let report = detector.detect(&RecordStore::new(records)).unwrap();
        prop_assert_eq!(report.devices.len(), devices + 1);
        prop_assert_eq!(report.outliers().count(), 0);
        for b in &report.baselines {
            prop_assert_eq!(b.baseline.unwrap().std_dev, 0.0);
        }
    }
}
