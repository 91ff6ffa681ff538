//! Durable audit trail of committed transactions.
//!
//! Every committed batch is appended as one audit entry per record, in the
//! line format `<source_id> <body>\n`. Auditing is best-effort: the consumer
//! retries a bounded number of times and then moves on, because auditing
//! must never block source acknowledgement.
//!
//! Variants: `local` (files under a locked root directory), `remote`
//! (a batched publish to the downstream stream), `nop` (discards).

pub mod local;
pub mod nop;
pub mod remote;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use local::{LocalLog, LocalLogConfig};
pub use nop::NopLog;
pub use remote::{RemoteLog, RemoteLogConfig};

use crate::fs::Filesystem;
use crate::types::{Record, RecordId, Transaction};

/// Errors surfaced by audit sinks.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Filesystem-level failure in the local variant.
    #[error("audit io: {0}")]
    Io(#[from] std::io::Error),

    /// Credentials were rejected at construction.
    #[error("invalid credentials: {0}")]
    Credentials(String),

    /// The publish call to the remote sink failed as a whole.
    #[error("audit transport: {0}")]
    Transport(String),
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Capability the consumer is written against: append one transaction.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Writes each `(id, record)` in the transaction to the sink, returning
    /// once durability is established for the variant.
    async fn append(&self, txn: &Transaction) -> Result<()>;
}

/// One audit line: `<source_id> <body>\n`.
pub(crate) fn row(record: &Record) -> Vec<u8> {
    let mut line = Vec::with_capacity(record.source_id().as_str().len() + record.body().len() + 2);
    line.extend_from_slice(record.source_id().as_str().as_bytes());
    line.push(b' ');
    line.extend_from_slice(record.body());
    line.push(b'\n');
    line
}

/// Which audit variant to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    Remote,
    Local,
    Nop,
}

impl std::str::FromStr for AuditKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "remote" => Ok(AuditKind::Remote),
            "local" => Ok(AuditKind::Local),
            "nop" => Ok(AuditKind::Nop),
            other => Err(format!("unexpected audit log type {other:?}")),
        }
    }
}

/// Configuration for constructing an audit log.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub kind: AuditKind,
    pub local_root: Option<PathBuf>,
    pub remote: Option<RemoteLogConfig>,
}

impl AuditConfig {
    /// Constructs the configured audit variant.
    ///
    /// The local variant runs its recovery sweep here, before anything can
    /// append.
    pub async fn build(self, fs: Arc<dyn Filesystem>) -> Result<Arc<dyn AuditLog>> {
        match self.kind {
            AuditKind::Local => {
                let root = self.local_root.ok_or_else(|| {
                    AuditError::Io(std::io::Error::other(
                        "local audit log selected without a root path",
                    ))
                })?;
                Ok(Arc::new(LocalLog::open(LocalLogConfig { root }, fs)?))
            }
            AuditKind::Remote => {
                let config = self.remote.ok_or_else(|| {
                    AuditError::Transport(
                        "remote audit log selected without remote configuration".to_string(),
                    )
                })?;
                Ok(Arc::new(RemoteLog::connect(config).await?))
            }
            AuditKind::Nop => Ok(Arc::new(NopLog)),
        }
    }
}

/// A small bounded set of recently appended ids, kept by the remote variant
/// for observation only. Eviction is deliberately a no-op.
#[derive(Debug)]
pub(crate) struct ObservedIds {
    capacity: usize,
    order: std::collections::VecDeque<RecordId>,
}

impl ObservedIds {
    pub(crate) fn new(capacity: usize) -> Self {
        ObservedIds {
            capacity,
            order: std::collections::VecDeque::new(),
        }
    }

    pub(crate) fn observe(&mut self, id: RecordId) {
        if self.capacity == 0 {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            self.order.pop_front();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Receipt, SourceId};

    #[test]
    fn row_format_is_source_id_space_body_newline() {
        let record = Record::new(SourceId::new("msg-7"), Receipt::new("r"), "payload");
        assert_eq!(row(&record), b"msg-7 payload\n");
    }

    #[test]
    fn row_preserves_binary_bodies() {
        let record = Record::new(SourceId::new("m"), Receipt::new("r"), &b"\x00\x01\xff"[..]);
        assert_eq!(row(&record), b"m \x00\x01\xff\n");
    }

    #[test]
    fn kind_parses_known_values() {
        assert_eq!("remote".parse::<AuditKind>().unwrap(), AuditKind::Remote);
        assert_eq!("local".parse::<AuditKind>().unwrap(), AuditKind::Local);
        assert_eq!("nop".parse::<AuditKind>().unwrap(), AuditKind::Nop);
        assert!("kafka".parse::<AuditKind>().is_err());
    }

    #[test]
    fn observed_ids_stay_bounded() {
        let mut observed = ObservedIds::new(3);
        for _ in 0..10 {
            observed.observe(RecordId::random());
        }
        assert_eq!(observed.len(), 3);
    }
}
