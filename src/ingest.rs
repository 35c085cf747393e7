//! Loading already-clean test records from CSV or JSON
//!
//! The CSV layout is the one the production test floor exports:
//!
//! ```text
//! Timestamp,Device_ID,Batch_ID,Test_Name,Voltage,Temperature,Frequency,Result,Error_Code,Execution_Time
//! 2025-01-01 06:00:00,DEV_001_0000,Batch_01,Timing_Check,1.05,65.2,2.4,PASS,,150.3
//! ```
//!
//! Columns are located by header name, so their order is free. Empty readings
//! load as missing; anything else that does not parse is rejected with the
//! offending line, never coerced.

use crate::error::IngestError;
use crate::record::{TestRecord, TestType};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header written by [`write_csv`]
pub const CSV_HEADER: [&str; 10] = [
    "Timestamp",
    "Device_ID",
    "Batch_ID",
    "Test_Name",
    "Voltage",
    "Temperature",
    "Frequency",
    "Result",
    "Error_Code",
    "Execution_Time",
];

/// Split CSV text into rows of fields, honoring quoted fields
///
/// Returns each row with the 1-based line it starts on.
fn split_rows(input: &str) -> Result<Vec<(usize, Vec<String>)>, IngestError> {
    let mut rows = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut row_start = 1;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
                if !(fields.len() == 1 && fields[0].trim().is_empty()) {
                    rows.push((row_start, std::mem::take(&mut fields)));
                }
                fields.clear();
                line += 1;
                row_start = line;
            }
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' => {
                field.push(c);
                line += 1;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(IngestError::Malformed {
            line: row_start,
            message: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        if !(fields.len() == 1 && fields[0].trim().is_empty()) {
            rows.push((row_start, fields));
        }
    }
    Ok(rows)
}

/// Column positions resolved from the header row
struct Columns {
    width: usize,
    timestamp: usize,
    device_id: usize,
    batch_id: usize,
    test_name: usize,
    result: usize,
    voltage: Option<usize>,
    temperature: Option<usize>,
    frequency: Option<usize>,
    error_code: Option<usize>,
    execution_time: Option<usize>,
}

impl Columns {
    fn from_header(line: usize, header: &[String]) -> Result<Self, IngestError> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &'static str| {
            find(name).ok_or(IngestError::MissingColumn { line, column: name })
        };

        Ok(Self {
            width: header.len(),
            timestamp: require("Timestamp")?,
            device_id: require("Device_ID")?,
            batch_id: require("Batch_ID")?,
            test_name: require("Test_Name")?,
            result: require("Result")?,
            voltage: find("Voltage"),
            temperature: find("Temperature"),
            frequency: find("Frequency"),
            error_code: find("Error_Code"),
            execution_time: find("Execution_Time"),
        })
    }
}

fn parse_timestamp(line: usize, value: &str) -> Result<Option<NaiveDateTime>, IngestError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map(|d| d.and_time(Default::default()))
        })
        .map(Some)
        .map_err(|_| IngestError::InvalidTimestamp {
            line,
            value: value.to_string(),
        })
}

fn parse_reading(
    line: usize,
    column: &'static str,
    value: Option<&str>,
) -> Result<Option<f64>, IngestError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(IngestError::NonNumeric {
            line,
            column,
            value: value.to_string(),
        }),
    }
}

fn parse_outcome(line: usize, value: &str) -> Result<bool, IngestError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "FAIL" => Ok(true),
        "PASS" => Ok(false),
        _ => Err(IngestError::InvalidOutcome {
            line,
            value: value.to_string(),
        }),
    }
}

/// Parse CSV text with a header row into records, in file order
pub fn parse_csv(input: &str) -> Result<Vec<TestRecord>, IngestError> {
    let mut rows = split_rows(input)?.into_iter();
    let Some((header_line, header)) = rows.next() else {
        return Ok(Vec::new());
    };
    let columns = Columns::from_header(header_line, &header)?;

    rows.map(|(line, fields)| {
        if fields.len() != columns.width {
            return Err(IngestError::Malformed {
                line,
                message: format!("expected {} fields, found {}", columns.width, fields.len()),
            });
        }
        let get = |i: Option<usize>| i.map(|i| fields[i].as_str());

        let test_name = fields[columns.test_name].trim();
        let test_type =
            TestType::from_name(test_name).ok_or_else(|| IngestError::UnknownTestType {
                line,
                value: test_name.to_string(),
            })?;
        let error_code = get(columns.error_code)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        Ok(TestRecord {
            device_id: fields[columns.device_id].trim().to_string(),
            batch_id: fields[columns.batch_id].trim().to_string(),
            test_type,
            timestamp: parse_timestamp(line, &fields[columns.timestamp])?,
            temperature: parse_reading(line, "Temperature", get(columns.temperature))?,
            voltage: parse_reading(line, "Voltage", get(columns.voltage))?,
            frequency: parse_reading(line, "Frequency", get(columns.frequency))?,
            execution_time: parse_reading(line, "Execution_Time", get(columns.execution_time))?,
            failed: parse_outcome(line, &fields[columns.result])?,
            error_code,
        })
    })
    .collect()
}

/// Parse a JSON array of records
pub fn parse_json(input: &str) -> Result<Vec<TestRecord>, IngestError> {
    Ok(serde_json::from_str(input)?)
}

/// Load records from a `.json` file, or from CSV for any other extension
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<TestRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read records: {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let records = if is_json {
        parse_json(&content)
    } else {
        parse_csv(&content)
    }
    .with_context(|| format!("Invalid records in {}", path.display()))?;

    tracing::info!(records = records.len(), path = %path.display(), "loaded records");
    Ok(records)
}

/// Escape CSV field (handle commas, quotes, newlines)
pub(crate) fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render records in the test-floor CSV layout
pub fn write_csv(records: &[TestRecord]) -> String {
    let reading = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();

    let mut output = CSV_HEADER.join(",");
    output.push('\n');
    for r in records {
        let fields = [
            r.timestamp
                .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default(),
            escape_field(&r.device_id),
            escape_field(&r.batch_id),
            r.test_type.to_string(),
            reading(r.voltage),
            reading(r.temperature),
            reading(r.frequency),
            if r.failed { "FAIL" } else { "PASS" }.to_string(),
            escape_field(r.error_code.as_deref().unwrap_or("")),
            reading(r.execution_time),
        ];
        output.push_str(&fields.join(","));
        output.push('\n');
    }
    output
}
