// Anomaly detection over batches, days and devices
//
// All three detectors share one rule: an observation is scored against a
// reference distribution with z = (observed - mean) / sample std-dev, and is
// flagged only when that std-dev is positive and |z| crosses a configured
// threshold. They differ in what forms the reference distribution:
//
// - batch:    failure rates of every eligible batch, the scored one included
//             (pooled), or of every eligible batch except it (leave-one-out)
// - temporal: failure counts of the W days strictly before the scored day
// - device:   per-device mean readings across the device population
//
// Each detector reads the shared RecordStore and owns its own report, so the
// pipeline can run them in parallel without coordination.

mod batch;
mod device;
mod flag;
mod temporal;

pub use batch::{BatchAnomaly, BatchAnomalyReport, BatchBaseline, BatchDetector, BatchStats};
pub use device::{
    DeviceDetector, DeviceDimension, DeviceOutlierReport, DeviceProfile, DimensionBaseline,
    DimensionScore,
};
pub use flag::{classify_severity, AnomalyFlag, AnomalySeverity, SubjectKind, ThresholdRule};
pub use temporal::{DayEvaluation, DayPoint, TemporalAnomalyReport, TemporalDetector};

#[cfg(test)]
mod tests;
