//! Queue variant that accepts and discards everything.

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{Record, Transaction};

use super::{BatchOutcome, Queue, Result};

/// A [`Queue`] that drops enqueues and never yields records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopQueue;

#[async_trait]
impl Queue for NopQueue {
    async fn enqueue(&self, _record: Record) -> Result<()> {
        Ok(())
    }

    async fn dequeue(&self) -> Result<Vec<Arc<Record>>> {
        Ok(Vec::new())
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
