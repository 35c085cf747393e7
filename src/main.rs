use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::Write;
use tracing::info;
use tracing_subscriber::EnvFilter;

use yieldlens::cli::Cli;
use yieldlens::config::AnalysisConfig;
use yieldlens::generate::{generate, GeneratorConfig};
use yieldlens::pipeline::Pipeline;
use yieldlens::record::RecordStore;
use yieldlens::{ingest, output};

/// Initialize tracing; `--debug` wins over `RUST_LOG`, which wins over `warn`
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Write a synthetic test log
fn run_generate(cli: &Cli, path: &std::path::Path) -> Result<()> {
    let config = GeneratorConfig {
        seed: cli.seed,
        ..GeneratorConfig::default()
    };
    let records = generate(&config);
    fs::write(path, ingest::write_csv(&records))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(records = records.len(), path = %path.display(), "generated test log");
    eprintln!("Generated {} records → {}", records.len(), path.display());
    Ok(())
}

fn load_config(cli: &Cli) -> Result<AnalysisConfig> {
    let base = match &cli.config {
        Some(path) => AnalysisConfig::from_toml(path)?,
        None => cli.preset.config(),
    };
    Ok(cli.apply(base))
}

fn run_analysis(cli: &Cli, input: &std::path::Path) -> Result<()> {
    let config = load_config(cli)?;
    let pipeline = Pipeline::new(config).context("Invalid analysis configuration")?;

    let records = ingest::load_records(input)?;
    let store = RecordStore::new(records);
    let findings = pipeline.run(&store);

    let report = output::render(&findings, cli.format, cli.csv_table, cli.fingerprint)?;
    match &cli.output {
        Some(path) => fs::write(path, report)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(report.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match (&cli.generate, &cli.input) {
        (Some(path), _) => run_generate(&cli, path),
        (None, Some(input)) => run_analysis(&cli, input),
        (None, None) => anyhow::bail!("an INPUT file or --generate <PATH> is required"),
    }
}
