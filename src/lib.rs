//! yieldlens - failure analysis and anomaly detection for semiconductor test logs
//!
//! This library categorizes failing tests by error code, correlates failures
//! with operating conditions, flags anomalous batches, days and devices, and
//! tracks failure-rate trends. [`pipeline::Pipeline`] runs every component over
//! an in-memory [`record::RecordStore`] and returns one deterministic
//! [`findings::Findings`] structure.
//!
//! # Example
//! ```
//! use yieldlens::config::AnalysisConfig;
//! use yieldlens::generate::{generate, GeneratorConfig};
//! use yieldlens::pipeline::Pipeline;
//! use yieldlens::record::RecordStore;
//!
//! let records = generate(&GeneratorConfig {
//!     batches: 5,
//!     devices_per_batch: 40,
//!     span_days: 20,
//!     anomalous_batch: None,
//!     ..GeneratorConfig::default()
//! });
//! let findings = Pipeline::new(AnalysisConfig::default())
//!     .unwrap()
//!     .run(&RecordStore::new(records));
//! assert_eq!(findings.summary.unique_batches, 5);
//! ```

pub mod anomaly;
pub mod breakdown;
pub mod categorize;
pub mod cli;
pub mod config;
pub mod correlate;
pub mod error;
pub mod findings;
pub mod generate;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod stats;
pub mod trend;
