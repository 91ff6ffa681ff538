//! Audit variant used when auditing is disabled.

use async_trait::async_trait;

use crate::types::Transaction;

use super::{AuditLog, Result};

/// An [`AuditLog`] that accepts and discards every transaction.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopLog;

#[async_trait]
impl AuditLog for NopLog {
    async fn append(&self, _txn: &Transaction) -> Result<()> {
        Ok(())
    }
}
