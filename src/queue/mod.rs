//! Wire-level interface to the at-least-once source queue.
//!
//! Three variants sit behind one capability set:
//!
//! - `remote`: the SQS binding: long-poll receive, best-effort batched
//!   visibility extension, acknowledgement chunked at the source batch limit.
//! - `virtual`: an in-memory queue for tests and local runs.
//! - `nop`: accepts and discards everything.
//!
//! The consumer is written against [`Queue`] only; the concrete variant is a
//! tagged selection from configuration.

pub mod memory;
pub mod nop;
pub mod remote;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::VirtualQueue;
pub use nop::NopQueue;
pub use remote::{RemoteQueue, RemoteQueueConfig};

use crate::types::{Record, Transaction};

/// Errors surfaced by queue adapters.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Credentials were rejected or could not be resolved at construction.
    #[error("invalid credentials: {0}")]
    Credentials(String),

    /// The configured queue name did not resolve to a queue URL.
    #[error("resolving queue {name}: {reason}")]
    Resolve { name: String, reason: String },

    /// A wire call failed as a whole (network, auth, throttling).
    #[error("queue transport: {0}")]
    Transport(String),

    /// A batch entry could not be constructed for the wire call.
    #[error("malformed batch entry: {0}")]
    Entry(String),
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Per-entry outcome of a batched acknowledgement call.
///
/// Partial failures are reported here, not as an error; an `Err` from the
/// call means the entire call failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub success: usize,
    pub failure: usize,
}

impl BatchOutcome {
    /// Sums outcomes across chunked calls.
    pub fn merge(self, other: BatchOutcome) -> BatchOutcome {
        BatchOutcome {
            success: self.success + other.success,
            failure: self.failure + other.failure,
        }
    }
}

/// Capability set the consumer is written against.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Publishes a single record. Used by the harness; production only reads.
    async fn enqueue(&self, record: Record) -> Result<()>;

    /// Long-polls the source for a batch of records.
    ///
    /// May return an empty batch on timeout. On return, the adapter has
    /// extended each record's visibility so the record stays invisible to
    /// other consumers for the configured interval.
    async fn dequeue(&self) -> Result<Vec<Arc<Record>>>;

    /// Acknowledges every record in the transaction via its receipt.
    async fn commit(&self, txn: &Transaction) -> Result<BatchOutcome>;

    /// Declares the records failed: nothing is acknowledged, so the source
    /// redelivers them once their visibility lapses.
    async fn failed(&self, txn: &Transaction) -> Result<BatchOutcome>;
}

/// Which queue variant to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Remote,
    Virtual,
    Nop,
}

impl std::str::FromStr for QueueKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "remote" => Ok(QueueKind::Remote),
            "virtual" => Ok(QueueKind::Virtual),
            "nop" => Ok(QueueKind::Nop),
            other => Err(format!("unexpected queue type {other:?}")),
        }
    }
}

/// Configuration for constructing a queue.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub kind: QueueKind,
    pub remote: Option<RemoteQueueConfig>,
}

impl QueueConfig {
    /// Constructs the configured queue variant.
    ///
    /// The remote variant resolves its queue URL here, so configuration
    /// errors (bad credentials, unknown queue) fail construction.
    pub async fn build(self) -> Result<Arc<dyn Queue>> {
        match self.kind {
            QueueKind::Remote => {
                let config = self.remote.ok_or_else(|| {
                    QueueError::Resolve {
                        name: String::new(),
                        reason: "remote queue selected without remote configuration".to_string(),
                    }
                })?;
                Ok(Arc::new(RemoteQueue::connect(config).await?))
            }
            QueueKind::Virtual => Ok(Arc::new(VirtualQueue::new())),
            QueueKind::Nop => Ok(Arc::new(NopQueue)),
        }
    }
}

/// Visibility extension expressed in whole seconds, as the source wants it.
///
/// A zero timeout disables extension calls entirely.
pub(crate) fn visibility_seconds(timeout: Duration) -> Option<i32> {
    let secs = timeout.as_secs();
    if secs == 0 {
        None
    } else {
        Some(secs.min(i32::MAX as u64) as i32)
    }
}
