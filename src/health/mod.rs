//! Indexer health scoring and reporting.

pub mod probe;
pub mod report;

pub use probe::{HealthProbe, HealthSnapshot, HealthSource, ProbeError};
pub use report::HealthReport;
