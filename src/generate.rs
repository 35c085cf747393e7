//! Seeded synthetic test-log generator
//!
//! Produces clean records with known structure for demos, benchmarks and
//! tests: one production batch fails at several times the base rate, failure
//! probability climbs above 80 °C, voltage extremes and failure-prone test
//! programs add their own multipliers. The same seed always yields the same
//! records.

use crate::record::{TestRecord, TestType};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Failure probability never exceeds this
const MAX_FAILURE_PROBABILITY: f64 = 0.30;

/// Temperature above which failures become more likely, °C
const HOT_THRESHOLD: f64 = 80.0;

/// Parameters of a synthetic production run
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub batches: usize,
    pub devices_per_batch: usize,
    pub base_failure_rate: f64,
    /// 1-based batch number with an elevated failure rate
    pub anomalous_batch: Option<usize>,
    pub anomaly_multiplier: f64,
    pub start: NaiveDateTime,
    pub span_days: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            batches: 25,
            devices_per_batch: 400,
            base_failure_rate: 0.018,
            anomalous_batch: Some(17),
            anomaly_multiplier: 4.0,
            start: NaiveDate::from_ymd_opt(2025, 1, 1)
                .and_then(|d| d.and_hms_opt(6, 0, 0))
                .unwrap_or_default(),
            span_days: 90,
        }
    }
}

/// Error codes each test program can report
pub fn error_codes(test_type: TestType) -> &'static [&'static str] {
    match test_type {
        TestType::TimingCheck => &["ERR_T01", "ERR_T02", "ERR_T03"],
        TestType::VoltageSweep => &["ERR_V01", "ERR_V02"],
        TestType::BurnIn => &["ERR_B01", "ERR_B02", "ERR_B03"],
        TestType::StressTest => &["ERR_S01", "ERR_S02"],
        TestType::DataIntegrity => &["ERR_D01", "ERR_D02"],
        TestType::FrequencyScan => &["ERR_F01", "ERR_F02"],
        TestType::LeakageTest => &["ERR_L01", "ERR_L02"],
        TestType::PowerCycle => &["ERR_P01", "ERR_P02"],
    }
}

/// Sample from a normal distribution using Box-Muller transform
fn gaussian(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen::<f64>();
    mean + (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos() * std_dev
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Probability that one test fails under the given conditions
pub fn failure_probability(
    config: &GeneratorConfig,
    batch: usize,
    temperature: f64,
    voltage: f64,
    test_type: TestType,
) -> f64 {
    let mut p = config.base_failure_rate;
    if config.anomalous_batch == Some(batch) {
        p *= config.anomaly_multiplier;
    }
    if temperature > HOT_THRESHOLD {
        p += (temperature - HOT_THRESHOLD) * 0.002;
    }
    if !(0.85..=1.25).contains(&voltage) {
        p *= 1.5;
    }
    match test_type {
        TestType::TimingCheck => p *= 1.8,
        TestType::BurnIn => p *= 1.3,
        _ => {}
    }
    p.min(MAX_FAILURE_PROBABILITY)
}

/// Generate a full production run, ordered by timestamp then device
pub fn generate(config: &GeneratorConfig) -> Vec<TestRecord> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let span_seconds = config.span_days.max(1) * 86_400;
    let mut records = Vec::new();

    for batch in 1..=config.batches {
        let batch_id = format!("Batch_{batch:02}");
        for device in 0..config.devices_per_batch {
            let device_id = format!("DEV_{batch:03}_{device:04}");
            let count = rng.gen_range(3..=TestType::ALL.len());
            let programs: Vec<TestType> = TestType::ALL
                .choose_multiple(&mut rng, count)
                .copied()
                .collect();

            for test_type in programs {
                let temperature = round_to(gaussian(&mut rng, 65.0, 18.0), 1).clamp(20.0, 120.0);
                let voltage = round_to(gaussian(&mut rng, 1.05, 0.12), 3).clamp(0.7, 1.4);
                let frequency = round_to(gaussian(&mut rng, 2.4, 0.3), 2).clamp(1.0, 3.5);
                let execution_time = round_to(gaussian(&mut rng, 150.0, 40.0).abs(), 1);

                let p = failure_probability(config, batch, temperature, voltage, test_type);
                let failed = rng.gen::<f64>() < p;
                let error_code = if failed {
                    error_codes(test_type)
                        .choose(&mut rng)
                        .map(|c| c.to_string())
                } else {
                    None
                };
                let offset = rng.gen_range(0..span_seconds);

                records.push(TestRecord {
                    device_id: device_id.clone(),
                    batch_id: batch_id.clone(),
                    test_type,
                    timestamp: Some(config.start + Duration::seconds(offset)),
                    temperature: Some(temperature),
                    voltage: Some(voltage),
                    frequency: Some(frequency),
                    execution_time: Some(execution_time),
                    failed,
                    error_code,
                });
            }
        }
    }

    records.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.device_id.cmp(&b.device_id))
            .then_with(|| a.test_type.cmp(&b.test_type))
    });
    tracing::debug!(records = records.len(), seed = config.seed, "generated records");
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::{CategoryTable, FailureCategory};

    fn small() -> GeneratorConfig {
        GeneratorConfig {
            batches: 6,
            devices_per_batch: 50,
            anomalous_batch: Some(4),
            span_days: 20,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_same_seed_same_records() {
        assert_eq!(generate(&small()), generate(&small()));
    }

    #[test]
    fn test_different_seed_differs() {
        let other = GeneratorConfig {
            seed: 7,
            ..small()
        };
        assert_ne!(generate(&small()), generate(&other));
    }

    #[test]
    fn test_records_are_clean_and_ordered() {
        let records = generate(&small());
        assert!(records.len() >= 6 * 50 * 3);
        assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        for r in &records {
            assert_eq!(r.failed, r.error_code.is_some());
            let t = r.temperature.unwrap();
            assert!((20.0..=120.0).contains(&t));
            assert!(r.execution_time.unwrap() >= 0.0);
        }
    }

    #[test]
    fn test_every_generated_code_is_categorized() {
        let table = CategoryTable::default();
        for test_type in TestType::ALL {
            for code in error_codes(test_type) {
                assert_ne!(table.lookup(code), FailureCategory::Unknown, "{code}");
            }
        }
    }

    #[test]
    fn test_failure_probability_rules() {
        let config = GeneratorConfig::default();
        let base = failure_probability(&config, 1, 65.0, 1.05, TestType::LeakageTest);
        assert!((base - 0.018).abs() < 1e-12);

        let anomalous = failure_probability(&config, 17, 65.0, 1.05, TestType::LeakageTest);
        assert!((anomalous - 0.072).abs() < 1e-12);

        let hot = failure_probability(&config, 1, 90.0, 1.05, TestType::LeakageTest);
        assert!((hot - 0.038).abs() < 1e-12);

        let capped = failure_probability(&config, 17, 120.0, 0.7, TestType::TimingCheck);
        assert_eq!(capped, MAX_FAILURE_PROBABILITY);
    }
}
