//! In-memory queue used by tests and local runs (the CLI's `virtual`).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::types::{Record, Transaction};

use super::{BatchOutcome, Queue, Result};

/// An in-memory [`Queue`] with no visibility semantics.
///
/// `enqueue` appends, `dequeue` takes whatever is buffered up to the batch
/// cap, and acknowledgement calls succeed wholesale. Redelivery behavior is
/// not simulated; tests that need redelivery enqueue the record again.
#[derive(Debug, Default)]
pub struct VirtualQueue {
    buffered: Mutex<VecDeque<Arc<Record>>>,
}

/// Dequeue batch cap, mirroring the source's batch limit.
const MAX_BATCH: usize = 10;

impl VirtualQueue {
    pub fn new() -> Self {
        VirtualQueue::default()
    }

    /// Number of records currently buffered. For tests.
    pub fn depth(&self) -> usize {
        self.buffered.lock().unwrap().len()
    }
}

#[async_trait]
impl Queue for VirtualQueue {
    async fn enqueue(&self, record: Record) -> Result<()> {
        self.buffered.lock().unwrap().push_back(record.shared());
        Ok(())
    }

    async fn dequeue(&self) -> Result<Vec<Arc<Record>>> {
        let mut buffered = self.buffered.lock().unwrap();
        let take = buffered.len().min(MAX_BATCH);
        Ok(buffered.drain(..take).collect())
    }

    async fn commit(&self, txn: &Transaction) -> Result<BatchOutcome> {
        Ok(BatchOutcome {
            success: txn.len(),
            failure: 0,
        })
    }

    async fn failed(&self, txn: &Transaction) -> Result<BatchOutcome> {
        Ok(BatchOutcome {
            success: txn.len(),
            failure: 0,
        })
    }
}
