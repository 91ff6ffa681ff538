//! The consumed record and its sharing semantics.
//!
//! A record is immutable after construction and is aliased freely between
//! the consumer, the in-flight FIFO, transactions, and the audit log, so it
//! is always handled as an `Arc<Record>`.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::ids::{Receipt, RecordId, SourceId};

/// A message consumed from the source queue.
#[derive(Debug, Clone)]
pub struct Record {
    /// Locally generated identifier, unique per delivery attempt.
    id: RecordId,

    /// Source-assigned message id; repeats across redeliveries.
    source_id: SourceId,

    /// Source-scoped acknowledgement handle.
    receipt: Receipt,

    /// Opaque payload forwarded downstream.
    body: Bytes,

    /// Wall-clock timestamp of dequeue.
    received_at: DateTime<Utc>,
}

impl Record {
    /// Creates a record at dequeue time, assigning a fresh [`RecordId`] and
    /// stamping the current wall-clock time.
    pub fn new(source_id: SourceId, receipt: Receipt, body: impl Into<Bytes>) -> Self {
        Record {
            id: RecordId::random(),
            source_id,
            receipt,
            body: body.into(),
            received_at: Utc::now(),
        }
    }

    /// Wraps the record for shared ownership.
    pub fn shared(self) -> Arc<Record> {
        Arc::new(self)
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn source_id(&self) -> &SourceId {
        &self.source_id
    }

    pub fn receipt(&self) -> &Receipt {
        &self.receipt
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}
