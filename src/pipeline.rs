//! End-to-end analysis run
//!
//! Configuration is validated when the pipeline is built; an invalid
//! configuration never reaches the records. A run categorizes the store, then
//! forks the independent components across the rayon pool and merges their
//! reports into [`Findings`]. Input problems stay local to the component that
//! hit them.

use crate::anomaly::{BatchDetector, DeviceDetector, TemporalDetector};
use crate::breakdown;
use crate::categorize::Categorizer;
use crate::config::AnalysisConfig;
use crate::correlate;
use crate::error::{ConfigError, InputError};
use crate::findings::{ComponentResult, Findings};
use crate::record::{Condition, RecordStore};
use crate::trend::TrendAnalyzer;
use tracing::{debug, info, warn};

/// Validated analysis pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AnalysisConfig,
}

impl Pipeline {
    /// Build a pipeline, refusing an invalid configuration
    pub fn new(config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run every component over `store`
    pub fn run(&self, store: &RecordStore) -> Findings {
        info!(records = store.len(), "starting analysis");

        let mut categorizer = Categorizer::new(&self.config.category_table);
        let categories = categorizer.analyze(store);
        let assigned = categorizer.assign(store);
        debug!(codes = categorizer.cached_codes(), "categorization complete");

        let batch = BatchDetector::from_config(&self.config);
        let temporal = TemporalDetector::from_config(&self.config);
        let device = DeviceDetector::from_config(&self.config);
        let trend = TrendAnalyzer::from_config(&self.config);

        let (statistics, detectors) = rayon::join(
            || {
                rayon::join(
                    || correlate::correlate_all(store, &Condition::ALL),
                    || breakdown::analyze(store, &self.config.bins),
                )
            },
            || {
                rayon::join(
                    || rayon::join(|| batch.detect(store, &assigned), || temporal.detect(store)),
                    || rayon::join(|| device.detect(store), || trend.analyze(store)),
                )
            },
        );
        let (correlations, breakdowns) = statistics;
        let ((batch_anomalies, daily_anomalies), (device_outliers, trends)) = detectors;

        let findings = Findings {
            version: env!("CARGO_PKG_VERSION").to_string(),
            summary: store.summary(),
            categories: component("categories", categories),
            correlations: component("correlations", correlations),
            breakdowns: component("breakdowns", breakdowns),
            batch_anomalies: component("batch_anomalies", batch_anomalies),
            daily_anomalies: component("daily_anomalies", daily_anomalies),
            device_outliers: component("device_outliers", device_outliers),
            trends: component("trends", trends),
        };

        info!(
            failed_components = findings.failed_components().len(),
            "analysis complete"
        );
        findings
    }
}

fn component<T>(name: &str, result: Result<T, InputError>) -> ComponentResult<T> {
    if let Err(e) = &result {
        warn!(component = name, error = %e, "could not compute");
    }
    result.into()
}
