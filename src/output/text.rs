//! Engineering summary for the terminal
//!
//! Every section renders from its component slot; a component that could not
//! be computed prints its reason in place of the table.

use crate::anomaly::{BatchAnomalyReport, DeviceOutlierReport, TemporalAnomalyReport};
use crate::breakdown::BreakdownReport;
use crate::categorize::CategoryReport;
use crate::correlate::{CorrelationResult, SIGNIFICANCE_LEVEL};
use crate::findings::{ComponentResult, Findings};
use crate::stats::Statistic;
use crate::trend::TrendReport;
use std::fmt::{self, Display, Formatter};

const WIDTH: usize = 70;

/// Rows shown in the longer tables
const TOP_N: usize = 10;

/// Text rendering of [`Findings`]
pub struct TextReport<'a> {
    findings: &'a Findings,
}

impl<'a> TextReport<'a> {
    pub fn new(findings: &'a Findings) -> Self {
        Self { findings }
    }
}

fn section(f: &mut Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{}", "=".repeat(WIDTH))?;
    writeln!(f, "  {title}")?;
    writeln!(f, "{}", "=".repeat(WIDTH))
}

fn rule(f: &mut Formatter<'_>, width: usize) -> fmt::Result {
    writeln!(f, "  {}", "─".repeat(width))
}

fn percent(rate: f64) -> String {
    format!("{:.2}%", rate * 100.0)
}

fn share(value: &Statistic) -> String {
    value
        .as_value()
        .map(percent)
        .unwrap_or_else(|| "-".to_string())
}

/// Print a computed component, or why it is missing
fn component<T>(
    f: &mut Formatter<'_>,
    result: &ComponentResult<T>,
    body: impl FnOnce(&mut Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    match result {
        ComponentResult::Computed { result } => body(f, result),
        ComponentResult::CouldNotCompute { reason } => {
            writeln!(f, "  could not compute: {reason}")
        }
    }
}

fn categories(f: &mut Formatter<'_>, report: &CategoryReport) -> fmt::Result {
    writeln!(f, "  Total failures: {}", report.total_failures)?;
    for c in &report.categories {
        writeln!(
            f,
            "  {:<18} {:>6}  {:>7}  codes: {:<3} avg temp: {:<8} avg volt: {:.3}",
            c.category.label(),
            c.count,
            share(&c.rate),
            c.distinct_error_codes,
            format!("{:.1}", c.mean_temperature),
            c.mean_voltage
        )?;
    }

    writeln!(f)?;
    writeln!(
        f,
        "  {:<12} {:<16} {:<16} {:>6}",
        "Error Code", "Test", "Category", "Count"
    )?;
    rule(f, 54)?;
    for e in report.error_codes.iter().take(TOP_N) {
        writeln!(
            f,
            "  {:<12} {:<16} {:<16} {:>6}",
            e.error_code,
            e.test_type.as_str(),
            e.category.label(),
            e.count
        )?;
    }
    Ok(())
}

fn correlations(f: &mut Formatter<'_>, results: &[CorrelationResult]) -> fmt::Result {
    writeln!(
        f,
        "  {:<16} {:>22} {:>10} {:>8} {:<10}",
        "Condition", "Coefficient", "p-value", "n", "Strength"
    )?;
    rule(f, 72)?;
    for r in results {
        let strength = r.strength.map(|s| format!("{s:?}")).unwrap_or_default();
        let p_value = r
            .p_value
            .as_value()
            .map(|p| format!("{p:.4}"))
            .unwrap_or_else(|| "-".to_string());
        let marker = if r.significant == Some(true) { " *" } else { "" };
        writeln!(
            f,
            "  {:<16} {:>22} {:>10} {:>8} {:<10}{marker}",
            r.condition.as_str(),
            r.coefficient.to_string(),
            p_value,
            r.sample_size,
            strength
        )?;
    }
    writeln!(f, "  * significant at p < {}", SIGNIFICANCE_LEVEL)?;
    Ok(())
}

fn breakdowns(f: &mut Formatter<'_>, report: &BreakdownReport) -> fmt::Result {
    match report.worst_test_type() {
        Some(worst) => {
            writeln!(f, "  Highest failure test: {}", worst.test_type)?;
            writeln!(f, "  Failure rate        : {:.4}", worst.failure_rate)?;
            writeln!(f, "  Tests / failures    : {} / {}", worst.total, worst.failures)?;
        }
        None => writeln!(f, "  No test type has a defined failure rate")?,
    }
    for t in &report.by_test_type {
        writeln!(
            f,
            "    {:<16} {:>7} {:>6}  {:.4}",
            t.test_type.as_str(),
            t.total,
            t.failures,
            t.failure_rate
        )?;
    }
    Ok(())
}

fn batches(f: &mut Formatter<'_>, report: &BatchAnomalyReport) -> fmt::Result {
    if let Some(b) = &report.population {
        writeln!(
            f,
            "  Baseline: mean {} sd {} over {} batches ({:?})",
            percent(b.mean),
            percent(b.std_dev),
            b.sample_size,
            report.baseline_mode
        )?;
    }
    let low_confidence = report.low_confidence().count();
    if low_confidence > 0 {
        writeln!(
            f,
            "  Low-confidence batches (< {} records): {low_confidence}",
            report.min_records
        )?;
    }

    let mut any = false;
    for b in report.flagged() {
        any = true;
        writeln!(
            f,
            "  {:<12} failure rate {:>7}  z = {:.2}  {}{}",
            b.stats.batch_id,
            percent(b.stats.failure_rate),
            b.flag.z_score,
            b.flag.severity.map(|s| format!("{s:?}")).unwrap_or_default(),
            if b.low_confidence { "  (low confidence)" } else { "" }
        )?;
    }
    if !any {
        writeln!(f, "  No anomalous batches detected.")?;
    }
    Ok(())
}

fn days(f: &mut Formatter<'_>, report: &TemporalAnomalyReport) -> fmt::Result {
    let spikes: Vec<_> = report.spikes().collect();
    writeln!(
        f,
        "  Days: {}  not evaluated: {}  spikes: {}",
        report.days.len(),
        report.not_evaluated(),
        spikes.len()
    )?;
    for d in spikes.iter().take(TOP_N) {
        let bound = d
            .upper_bound(report.threshold)
            .map(|b| format!("{b:.1}"))
            .unwrap_or_default();
        writeln!(f, "    {} : {} failures (bound: {bound})", d.date, d.failures)?;
    }
    Ok(())
}

fn devices(f: &mut Formatter<'_>, report: &DeviceOutlierReport) -> fmt::Result {
    let outliers: Vec<_> = report.outliers().collect();
    writeln!(
        f,
        "  Devices scored: {}  skipped: {}  outliers: {}",
        report.devices.len(),
        report.skipped_devices,
        outliers.len()
    )?;
    for d in outliers.iter().take(TOP_N) {
        let dims: Vec<String> = d
            .contributing()
            .map(|s| format!("{} z={:.2}", s.dimension, s.flag.z_score))
            .collect();
        writeln!(
            f,
            "    {:<16} {}/{} failed  [{}]",
            d.device_id,
            d.failures,
            d.tests,
            dims.join(", ")
        )?;
    }
    Ok(())
}

fn trends(f: &mut Formatter<'_>, report: &TrendReport) -> fmt::Result {
    if let Some(last) = report.daily.last() {
        writeln!(
            f,
            "  Latest day {}: {}",
            last.period,
            percent(last.failure_rate)
        )?;
        for r in &last.rolling {
            writeln!(f, "    rolling {:>2}-day: {:.4}", r.window, r.value)?;
        }
    }

    writeln!(f)?;
    writeln!(
        f,
        "  {:<12} {:>7} {:>9} {:>8} {:>10}",
        "Batch", "Total", "Failures", "Rate", "Delta pp"
    )?;
    rule(f, 50)?;
    for b in &report.batches {
        writeln!(
            f,
            "  {:<12} {:>7} {:>9} {:>8} {:>10}{}",
            b.batch_id,
            b.records,
            b.failures,
            percent(b.failure_rate),
            b.delta_pp
                .as_value()
                .map(|d| format!("{d:+.2}"))
                .unwrap_or_else(|| "-".to_string()),
            if b.alert { " <<<" } else { "" }
        )?;
    }
    Ok(())
}

impl Display for TextReport<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let findings = self.findings;
        let s = &findings.summary;

        writeln!(f, "{}", "=".repeat(WIDTH))?;
        writeln!(f, "  TEST LOG ANALYSIS SUMMARY (yieldlens {})", findings.version)?;
        writeln!(f, "{}", "=".repeat(WIDTH))?;
        writeln!(f, "  Total records     : {}", s.total_records)?;
        writeln!(f, "  Unique devices    : {}", s.unique_devices)?;
        writeln!(f, "  Total failures    : {}", s.total_failures)?;
        writeln!(
            f,
            "  Failure rate      : {}",
            share(&s.overall_failure_rate)
        )?;
        if let (Some(first), Some(last)) = (s.first_date, s.last_date) {
            writeln!(f, "  Date range        : {first} to {last}")?;
        }
        writeln!(f, "  Test types        : {}", s.unique_test_types)?;
        writeln!(f, "  Batches           : {}", s.unique_batches)?;

        section(f, "FAILURE CATEGORIES")?;
        component(f, &findings.categories, categories)?;
        section(f, "CONDITION CORRELATION")?;
        component(f, &findings.correlations, |f, r| correlations(f, r))?;
        section(f, "FAILURE RATE BY TEST")?;
        component(f, &findings.breakdowns, breakdowns)?;
        section(f, "ANOMALOUS BATCHES")?;
        component(f, &findings.batch_anomalies, batches)?;
        section(f, "ERROR SPIKES")?;
        component(f, &findings.daily_anomalies, days)?;
        section(f, "OUTLIER DEVICES")?;
        component(f, &findings.device_outliers, devices)?;
        section(f, "TRENDS")?;
        component(f, &findings.trends, trends)?;
        Ok(())
    }
}
