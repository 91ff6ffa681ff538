//! Prometheus counters shared by the consumers.
//!
//! Counters are cheap cloneable handles; every consumer gets a clone of the
//! same set, so the admin surface reports process-wide totals. Registration
//! into the registry is optional (`-metrics.registration`), matching
//! deployments that scrape a shared default registry.

use prometheus::{IntCounter, Opts, Registry};
use thiserror::Error;

/// Namespace prefixed to every counter.
const NAMESPACE: &str = "courier";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics registration: {0}")]
    Register(#[from] prometheus::Error),
}

/// The consumer counter set.
///
/// A segment is one dequeue batch or one replicate/failure operation; a
/// record is a single message inside one.
#[derive(Debug, Clone)]
pub struct ConsumerMetrics {
    pub consumed_segments: IntCounter,
    pub consumed_records: IntCounter,
    pub replicated_segments: IntCounter,
    pub replicated_records: IntCounter,
    pub failed_segments: IntCounter,
    pub failed_records: IntCounter,
}

fn counter(name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    Ok(IntCounter::with_opts(
        Opts::new(name, help).namespace(NAMESPACE),
    )?)
}

impl ConsumerMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        Ok(ConsumerMetrics {
            consumed_segments: counter("consumed_segments", "Segments consumed from the source.")?,
            consumed_records: counter("consumed_records", "Records consumed from the source.")?,
            replicated_segments: counter(
                "replicated_segments",
                "Segments replicated to the recipient.",
            )?,
            replicated_records: counter(
                "replicated_records",
                "Records replicated to the recipient.",
            )?,
            failed_segments: counter("failed_segments", "Segments declared failed.")?,
            failed_records: counter("failed_records", "Records declared failed.")?,
        })
    }

    /// Registers every counter into the registry.
    pub fn register(&self, registry: &Registry) -> Result<(), MetricsError> {
        registry.register(Box::new(self.consumed_segments.clone()))?;
        registry.register(Box::new(self.consumed_records.clone()))?;
        registry.register(Box::new(self.replicated_segments.clone()))?;
        registry.register(Box::new(self.replicated_records.clone()))?;
        registry.register(Box::new(self.failed_segments.clone()))?;
        registry.register(Box::new(self.failed_records.clone()))?;
        Ok(())
    }
}
