//! Typed test records and the immutable record store
//!
//! Records arrive already cleaned. Readings may still be absent; each
//! analysis declares which fields it needs and rejects records without them
//! through the accessors on [`RecordStore`].

use crate::error::InputError;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Test program executed on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TestType {
    #[serde(rename = "Timing_Check")]
    TimingCheck,
    #[serde(rename = "Voltage_Sweep")]
    VoltageSweep,
    #[serde(rename = "Burn_In")]
    BurnIn,
    #[serde(rename = "Stress_Test")]
    StressTest,
    #[serde(rename = "Data_Integrity")]
    DataIntegrity,
    #[serde(rename = "Frequency_Scan")]
    FrequencyScan,
    #[serde(rename = "Leakage_Test")]
    LeakageTest,
    #[serde(rename = "Power_Cycle")]
    PowerCycle,
}

impl TestType {
    pub const ALL: [TestType; 8] = [
        TestType::TimingCheck,
        TestType::VoltageSweep,
        TestType::BurnIn,
        TestType::StressTest,
        TestType::DataIntegrity,
        TestType::FrequencyScan,
        TestType::LeakageTest,
        TestType::PowerCycle,
    ];

    /// Name as written in test logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::TimingCheck => "Timing_Check",
            TestType::VoltageSweep => "Voltage_Sweep",
            TestType::BurnIn => "Burn_In",
            TestType::StressTest => "Stress_Test",
            TestType::DataIntegrity => "Data_Integrity",
            TestType::FrequencyScan => "Frequency_Scan",
            TestType::LeakageTest => "Leakage_Test",
            TestType::PowerCycle => "Power_Cycle",
        }
    }

    /// Parse a log name; accepts the canonical spelling case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environmental or measured quantity attached to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Temperature,
    Voltage,
    Frequency,
    ExecutionTime,
}

impl Condition {
    pub const ALL: [Condition; 4] = [
        Condition::Temperature,
        Condition::Voltage,
        Condition::Frequency,
        Condition::ExecutionTime,
    ];

    /// The three environmental readings every record is expected to carry
    pub const ENVIRONMENTAL: [Condition; 3] = [
        Condition::Temperature,
        Condition::Voltage,
        Condition::Frequency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Temperature => "temperature",
            Condition::Voltage => "voltage",
            Condition::Frequency => "frequency",
            Condition::ExecutionTime => "execution_time",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Condition::Temperature => "°C",
            Condition::Voltage => "V",
            Condition::Frequency => "GHz",
            Condition::ExecutionTime => "ms",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One test execution on one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub device_id: String,
    pub batch_id: String,
    pub test_type: TestType,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub execution_time: Option<f64>,
    /// `true` when the device failed this test
    pub failed: bool,
    /// Present only on failing records
    #[serde(default)]
    pub error_code: Option<String>,
}

impl TestRecord {
    pub fn reading(&self, condition: Condition) -> Option<f64> {
        match condition {
            Condition::Temperature => self.temperature,
            Condition::Voltage => self.voltage,
            Condition::Frequency => self.frequency,
            Condition::ExecutionTime => self.execution_time,
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.timestamp.map(|ts| ts.date())
    }
}

/// ISO-8601 week identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IsoWeek {
    pub year: i32,
    pub week: u32,
}

impl IsoWeek {
    pub fn of(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }
}

impl fmt::Display for IsoWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// Order batch ids by production sequence: a trailing run of digits compares
/// numerically ("Batch_9" before "Batch_10"), everything else lexically.
pub fn batch_order(a: &str, b: &str) -> Ordering {
    fn split(id: &str) -> (&str, Option<u64>) {
        let digits = id.len() - id.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return (id, None);
        }
        let (prefix, number) = id.split_at(id.len() - digits);
        (prefix, number.parse().ok())
    }

    let (pa, na) = split(a);
    let (pb, nb) = split(b);
    pa.cmp(pb).then_with(|| na.cmp(&nb)).then_with(|| a.cmp(b))
}

/// Immutable, validated collection of test records
///
/// Constructed once per run; every component reads it through shared
/// references. Field presence is checked lazily by the `require_*`
/// accessors so that a missing reading only fails the analysis that needs it.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<TestRecord>,
}

impl RecordStore {
    pub fn new(records: Vec<TestRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[TestRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.records.iter().filter(|r| r.failed).count()
    }

    /// Fail fast on an empty store
    pub fn require_non_empty(&self) -> Result<(), InputError> {
        if self.records.is_empty() {
            Err(InputError::EmptyInput)
        } else {
            Ok(())
        }
    }

    /// Reading of `condition` on record `index`, which must be present and finite
    pub fn require_reading(
        &self,
        index: usize,
        condition: Condition,
    ) -> Result<f64, InputError> {
        let field = condition.as_str();
        match self.records[index].reading(condition) {
            None => Err(InputError::MissingField { index, field }),
            Some(v) if !v.is_finite() => Err(InputError::NonFinite {
                index,
                field,
                value: v,
            }),
            Some(v) => Ok(v),
        }
    }

    /// Reading that may legitimately be absent, but must be finite when present
    pub fn optional_reading(
        &self,
        index: usize,
        condition: Condition,
    ) -> Result<Option<f64>, InputError> {
        match self.records[index].reading(condition) {
            Some(v) if !v.is_finite() => Err(InputError::NonFinite {
                index,
                field: condition.as_str(),
                value: v,
            }),
            other => Ok(other),
        }
    }

    pub fn require_date(&self, index: usize) -> Result<NaiveDate, InputError> {
        self.records[index]
            .date()
            .ok_or(InputError::MissingField {
                index,
                field: "timestamp",
            })
    }

    pub fn require_batch_id(&self, index: usize) -> Result<&str, InputError> {
        non_empty(&self.records[index].batch_id, index, "batch_id")
    }

    pub fn require_device_id(&self, index: usize) -> Result<&str, InputError> {
        non_empty(&self.records[index].device_id, index, "device_id")
    }

    /// Distinct devices, batches and test types, plus the covered date range
    pub fn summary(&self) -> StoreSummary {
        let devices: BTreeSet<&str> = self.records.iter().map(|r| r.device_id.as_str()).collect();
        let batches: BTreeSet<&str> = self.records.iter().map(|r| r.batch_id.as_str()).collect();
        let test_types: BTreeSet<TestType> = self.records.iter().map(|r| r.test_type).collect();
        let dates: Vec<NaiveDate> = self.records.iter().filter_map(TestRecord::date).collect();

        StoreSummary {
            total_records: self.records.len(),
            total_failures: self.failure_count(),
            overall_failure_rate: crate::stats::rate(self.failure_count(), self.records.len()),
            unique_devices: devices.len(),
            unique_batches: batches.len(),
            unique_test_types: test_types.len(),
            first_date: dates.iter().min().copied(),
            last_date: dates.iter().max().copied(),
        }
    }
}

fn non_empty<'a>(
    value: &'a str,
    index: usize,
    field: &'static str,
) -> Result<&'a str, InputError> {
    if value.trim().is_empty() {
        Err(InputError::EmptyIdentifier { index, field })
    } else {
        Ok(value)
    }
}

/// Headline counts over the whole store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub total_records: usize,
    pub total_failures: usize,
    pub overall_failure_rate: crate::stats::Statistic,
    pub unique_devices: usize,
    pub unique_batches: usize,
    pub unique_test_types: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Passing record with nominal readings
    pub fn pass(device: &str, batch: &str, date: (i32, u32, u32)) -> TestRecord {
        TestRecord {
            device_id: device.to_string(),
            batch_id: batch.to_string(),
            test_type: TestType::TimingCheck,
            timestamp: NaiveDate::from_ymd_opt(date.0, date.1, date.2)
                .and_then(|d| d.and_hms_opt(8, 0, 0)),
            temperature: Some(65.0),
            voltage: Some(1.05),
            frequency: Some(2.4),
            execution_time: Some(150.0),
            failed: false,
            error_code: None,
        }
    }

    /// Failing record with the given error code
    pub fn fail(device: &str, batch: &str, date: (i32, u32, u32), code: &str) -> TestRecord {
        TestRecord {
            failed: true,
            error_code: Some(code.to_string()),
            ..pass(device, batch, date)
        }
    }
}
