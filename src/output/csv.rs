//! CSV output format for trend and batch tables
//!
//! Rolling averages are written as two columns, the number and its status
//! (`value`, `partial` or `undefined`), so a plot can style partial windows
//! differently instead of mistaking them for full ones.

use crate::findings::{ComponentResult, Findings};
use crate::stats::Statistic;
use crate::trend::{TrendPoint, TrendReport};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::fmt::Display;

/// Which table `--format csv` writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CsvTable {
    /// Daily failure rate with rolling averages
    #[default]
    Daily,
    /// ISO-weekly failure rate with rolling averages
    Weekly,
    /// Per-batch failure rate and batch-over-batch delta
    Batches,
}

fn number(value: &Statistic) -> String {
    value
        .as_any_value()
        .map(|v| format!("{v:.6}"))
        .unwrap_or_default()
}

fn status(value: &Statistic) -> &'static str {
    match value {
        Statistic::Value { .. } => "value",
        Statistic::Partial { .. } => "partial",
        Statistic::Undefined { .. } => "undefined",
    }
}

fn series_csv<P: Display>(label: &str, points: &[TrendPoint<P>]) -> String {
    let windows: Vec<usize> = points
        .first()
        .map(|p| p.rolling.iter().map(|r| r.window).collect())
        .unwrap_or_default();

    let mut header = vec![
        label.to_string(),
        "total".to_string(),
        "failures".to_string(),
        "failure_rate".to_string(),
    ];
    for w in &windows {
        header.push(format!("rolling_{w}"));
        header.push(format!("rolling_{w}_status"));
    }

    let mut output = header.join(",");
    output.push('\n');
    for point in points {
        let mut row = vec![
            point.period.to_string(),
            point.total.to_string(),
            point.failures.to_string(),
            format!("{:.6}", point.failure_rate),
        ];
        for r in &point.rolling {
            row.push(number(&r.value));
            row.push(status(&r.value).to_string());
        }
        output.push_str(&row.join(","));
        output.push('\n');
    }
    output
}

/// Daily series: `date,total,failures,failure_rate,rolling_N,rolling_N_status...`
pub fn daily_csv(trends: &TrendReport) -> String {
    series_csv("date", &trends.daily)
}

/// Weekly series keyed by ISO week (`2025-W07`)
pub fn weekly_csv(trends: &TrendReport) -> String {
    series_csv("week", &trends.weekly)
}

/// Batches in production order with their percentage-point deltas
pub fn batch_csv(trends: &TrendReport) -> String {
    let mut output =
        String::from("batch_id,records,failures,failure_rate,delta_pp,delta_status,alert\n");
    for b in &trends.batches {
        output.push_str(&format!(
            "{},{},{},{:.6},{},{},{}\n",
            crate::ingest::escape_field(&b.batch_id),
            b.records,
            b.failures,
            b.failure_rate,
            number(&b.delta_pp),
            status(&b.delta_pp),
            b.alert
        ));
    }
    output
}

/// Render the requested table; trends must have been computed
pub fn render(findings: &Findings, table: CsvTable) -> Result<String> {
    let trends = match &findings.trends {
        ComponentResult::Computed { result } => result,
        ComponentResult::CouldNotCompute { reason } => {
            bail!("trends could not be computed: {reason}")
        }
    };
    Ok(match table {
        CsvTable::Daily => daily_csv(trends),
        CsvTable::Weekly => weekly_csv(trends),
        CsvTable::Batches => batch_csv(trends),
    })
}
