// Scenario tests for the anomaly detectors
//
// Each test builds a realistic record population and checks the detector
// output end to end, including the flag invariant (no flag without spread).

use super::*;
use crate::record::fixtures::{fail, pass};
use crate::record::{RecordStore, TestRecord};

/// `records` tests in `batch` on `date`, the first `failures` of them failing
fn batch_records(
    batch: &str,
    records: usize,
    failures: usize,
    date: (i32, u32, u32),
) -> Vec<TestRecord> {
    (0..records)
        .map(|i| {
            let device = format!("{batch}_D{i:04}");
            if i < failures {
                fail(&device, batch, date, "ERR_T01")
            } else {
                pass(&device, batch, date)
            }
        })
        .collect()
}

/// 24 steady batches alternating 2% and 4% failure, plus one 200-record
/// batch failing at 10%
fn production_with_bad_batch() -> RecordStore {
    let mut records = Vec::new();
    for b in 1..=24 {
        let failures = if b % 2 == 0 { 4 } else { 2 };
        records.extend(batch_records(&format!("Batch_{b:02}"), 100, failures, (2025, 2, 1)));
    }
    records.extend(batch_records("Batch_25", 200, 20, (2025, 2, 1)));
    RecordStore::new(records)
}

fn assert_flags_have_spread<'a>(flags: impl Iterator<Item = &'a AnomalyFlag>) {
    for flag in flags.filter(|f| f.flagged) {
        let baseline = flag.baseline.expect("flagged without baseline");
        assert!(baseline.std_dev > 0.0, "{} flagged with zero spread", flag.subject);
    }
}

/// Scenario: a 10% batch against peers averaging 3% with σ ≈ 1%
///
/// Scored against the other 24 batches the z-score is close to 7.
#[test]
fn test_bad_batch_against_its_peers() {
    let store = production_with_bad_batch();
    let categories = vec![None; store.len()];

    let detector = BatchDetector::new(3.0, 30, BatchBaseline::LeaveOneOut);
    let report = detector.detect(&store, &categories).unwrap();

    let worst = &report.batches[0];
    assert_eq!(worst.stats.batch_id, "Batch_25");
    assert_eq!(worst.stats.records, 200);
    assert_eq!(worst.stats.failure_rate, 0.10);

    let baseline = worst.flag.baseline.unwrap();
    assert_eq!(baseline.sample_size, 24);
    assert!((baseline.mean - 0.03).abs() < 1e-12);
    assert!((baseline.std_dev - 0.01).abs() < 0.001);

    let z = worst.flag.z_score.as_value().unwrap();
    assert!((z - 7.0).abs() < 0.2, "z = {z}");
    assert!(worst.flag.flagged);
    assert_eq!(worst.flag.severity, Some(AnomalySeverity::High));
    assert_eq!(report.flagged().count(), 1);
}

/// The pooled baseline includes the bad batch itself, which dampens its
/// z-score, but it still clears the default threshold.
#[test]
fn test_bad_batch_pooled_baseline() {
    let store = production_with_bad_batch();
    let categories = vec![None; store.len()];

    let report = BatchDetector::new(3.0, 30, BatchBaseline::Pooled)
        .detect(&store, &categories)
        .unwrap();

    assert_eq!(report.population.unwrap().sample_size, 25);
    let flagged: Vec<&str> = report
        .flagged()
        .map(|b| b.stats.batch_id.as_str())
        .collect();
    assert_eq!(flagged, vec!["Batch_25"]);

    let z = report.batches[0].flag.z_score.as_value().unwrap();
    assert!(z > 3.0 && z < 4.5, "z = {z}");
    assert_flags_have_spread(report.batches.iter().map(|b| &b.flag));
}

/// Small pilot batches are scored but never move the baseline
#[test]
fn test_pilot_batch_does_not_shift_baseline() {
    let base = production_with_bad_batch();
    let mut records = base.records().to_vec();
    records.extend(batch_records("Batch_26", 5, 5, (2025, 2, 1)));
    let store = RecordStore::new(records);
    let categories = vec![None; store.len()];

    let detector = BatchDetector::new(3.0, 30, BatchBaseline::Pooled);
    let with_pilot = detector.detect(&store, &categories).unwrap();
    let without = detector
        .detect(&base, &vec![None; base.len()])
        .unwrap();

    assert_eq!(with_pilot.population, without.population);
    let pilot = with_pilot
        .batches
        .iter()
        .find(|b| b.stats.batch_id == "Batch_26")
        .unwrap();
    assert!(pilot.low_confidence);
    assert!(pilot.flag.flagged);
}

/// Scenario: two quiet weeks then one day with a burst of failures
#[test]
fn test_daily_spike_in_record_store() {
    let mut records = Vec::new();
    let quiet = [2, 3, 2, 4, 3, 2, 3, 3, 2, 4, 3, 2, 3, 2];
    for (day, failures) in quiet.iter().enumerate() {
        let date = (2025, 4, day as u32 + 1);
        records.extend(batch_records(&format!("Batch_{day:02}"), 40, *failures, date));
    }
    records.extend(batch_records("Batch_14", 40, 15, (2025, 4, 15)));

    let report = TemporalDetector::new(7, 3.0)
        .detect(&RecordStore::new(records))
        .unwrap();

    assert_eq!(report.days.len(), 15);
    assert_eq!(report.not_evaluated(), 7);
    let spikes: Vec<String> = report.spikes().map(|d| d.date.to_string()).collect();
    assert_eq!(spikes, vec!["2025-04-15"]);

    let last = report.days.last().unwrap();
    assert_eq!(last.failures, 15);
    assert!(last.upper_bound(report.threshold).unwrap() < 15.0);

    assert_flags_have_spread(report.days.iter().filter_map(|d| match &d.evaluation {
        DayEvaluation::Evaluated { flag } => Some(flag),
        DayEvaluation::NotEvaluated { .. } => None,
    }));
}

/// Scenario: a device whose temperature stays within one population σ is
/// never an outlier, even with a genuine outlier in the population
#[test]
fn test_device_within_one_sigma_never_flagged() {
    let mut records = Vec::new();
    for i in 0..40 {
        records.push(TestRecord {
            temperature: Some(60.0 + (i % 8) as f64),
            ..pass(&format!("DEV_{i:03}"), "Batch_01", (2025, 1, 1))
        });
    }
    records.push(TestRecord {
        temperature: Some(125.0),
        ..pass("DEV_HOT", "Batch_01", (2025, 1, 1))
    });

    let report = DeviceDetector::new(3.0, DeviceDimension::ENVIRONMENTAL.to_vec(), 1)
        .detect(&RecordStore::new(records))
        .unwrap();

    let temperature = report.baselines[0].baseline.unwrap();
    for device in &report.devices {
        let observed = device.scores[0].flag.observed;
        if (observed - temperature.mean).abs() <= temperature.std_dev {
            assert!(!device.is_outlier(), "{} flagged", device.device_id);
        }
    }
    let outliers: Vec<&str> = report.outliers().map(|d| d.device_id.as_str()).collect();
    assert_eq!(outliers, vec!["DEV_HOT"]);

    assert_flags_have_spread(
        report
            .devices
            .iter()
            .flat_map(|d| d.scores.iter().map(|s| &s.flag)),
    );
}
