//! The atomic unit handed to `queue.commit`, `queue.failed`, and
//! `audit.append`.
//!
//! A transaction is an insertion-ordered sequence of `(id, record)` pairs
//! built by the consumer for a single commit or failure operation. It is
//! created per batch, consumed once, and discarded.

use std::sync::Arc;

use super::ids::RecordId;
use super::record::Record;

/// An insertion-ordered batch of records committed or failed as a unit.
#[derive(Debug, Default)]
pub struct Transaction {
    entries: Vec<(RecordId, Arc<Record>)>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction::default()
    }

    /// Appends a record to the transaction.
    pub fn push(&mut self, id: RecordId, record: Arc<Record>) {
        self.entries.push((id, record));
    }

    /// Walks the entries in insertion order, stopping at the first error.
    pub fn walk<E>(
        &self,
        mut f: impl FnMut(RecordId, &Record) -> Result<(), E>,
    ) -> Result<(), E> {
        for (id, record) in &self.entries {
            f(*id, record)?;
        }
        Ok(())
    }

    /// Iterates the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Arc<Record>)> {
        self.entries.iter().map(|(id, rec)| (*id, rec))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Empties the transaction once it has been consumed.
    pub fn flush(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Receipt, SourceId};

    fn record(n: u32) -> Arc<Record> {
        Record::new(
            SourceId::new(format!("m-{n}")),
            Receipt::new(format!("r-{n}")),
            format!("body-{n}"),
        )
        .shared()
    }

    #[test]
    fn push_preserves_insertion_order() {
        let mut txn = Transaction::new();
        let records: Vec<_> = (0..5).map(record).collect();
        for rec in &records {
            txn.push(rec.id(), rec.clone());
        }

        let walked: Vec<_> = txn.iter().map(|(id, _)| id).collect();
        let expected: Vec<_> = records.iter().map(|r| r.id()).collect();
        assert_eq!(walked, expected);
    }

    #[test]
    fn walk_stops_at_first_error() {
        let mut txn = Transaction::new();
        for n in 0..4 {
            let rec = record(n);
            txn.push(rec.id(), rec);
        }

        let mut seen = 0;
        let result: Result<(), &str> = txn.walk(|_, _| {
            seen += 1;
            if seen == 2 { Err("boom") } else { Ok(()) }
        });

        assert_eq!(result, Err("boom"));
        assert_eq!(seen, 2);
    }

    #[test]
    fn flush_empties_the_transaction() {
        let mut txn = Transaction::new();
        let rec = record(1);
        txn.push(rec.id(), rec);
        assert_eq!(txn.len(), 1);

        txn.flush();

        assert_eq!(txn.len(), 0);
        assert!(txn.is_empty());
        let mut walked = 0;
        let _: Result<(), ()> = txn.walk(|_, _| {
            walked += 1;
            Ok(())
        });
        assert_eq!(walked, 0);
    }
}
