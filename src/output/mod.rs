//! Rendering findings for people and downstream tools
//!
//! - `json`: the full findings structure, optionally with its fingerprint
//! - `text`: engineering summary for the terminal
//! - `csv`: one trend or batch table, ready for plotting

pub mod csv;
pub mod json;
pub mod text;

use crate::findings::Findings;
use anyhow::Result;
use clap::ValueEnum;

/// Output format for analysis results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV table for spreadsheets and plotting
    Csv,
}

/// Render `findings` in `format`
pub fn render(
    findings: &Findings,
    format: OutputFormat,
    table: csv::CsvTable,
    fingerprint: bool,
) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let mut out = text::TextReport::new(findings).to_string();
            if fingerprint {
                out.push_str(&format!("\nFingerprint: {}\n", findings.fingerprint()?));
            }
            Ok(out)
        }
        OutputFormat::Json => json::render(findings, fingerprint),
        OutputFormat::Csv => csv::render(findings, table),
    }
}
