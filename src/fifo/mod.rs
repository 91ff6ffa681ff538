//! The in-flight FIFO owned by a single consumer.
//!
//! An insertion-ordered mapping from record id to record, holding everything
//! the consumer has fetched but not yet forwarded. The FIFO is not
//! thread-safe; a consumer owns its FIFO exclusively. There is no internal
//! capacity bound; the consumer enforces a target batch size.
//!
//! Every removal fires an eviction callback tagged with the reason, so the
//! owner can observe records leaving the buffer without threading state
//! through each call site.
//!
//! # Drain
//!
//! [`Fifo::drain`] is the replicate primitive: it walks entries head-first,
//! invoking a fallible callback per entry. On the first callback error it
//! stops, leaving the failing entry and everything after it in the FIFO in
//! their original order, and returns the entries already processed together
//! with the error. This partial-failure shape preserves causal ordering:
//! everything successfully sent is out, everything from the failure onward
//! remains for the failure path to route.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use crate::types::{Record, RecordId};

/// Why an entry left the FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    /// Removed from the head by [`Fifo::pop`].
    Popped,
    /// Removed by key via [`Fifo::remove`].
    Removed,
    /// Successfully processed during a [`Fifo::drain`].
    Dequeued,
    /// Discarded by [`Fifo::purge`].
    Purged,
}

/// Callback fired for every eviction.
pub type EvictCallback = Box<dyn FnMut(EvictReason, &RecordId, &Record) + Send>;

/// Insertion-ordered buffer of in-flight records.
pub struct Fifo {
    items: VecDeque<(RecordId, Arc<Record>)>,
    on_evict: EvictCallback,
}

impl Fifo {
    /// Creates an empty FIFO with the given eviction callback.
    pub fn new(on_evict: EvictCallback) -> Self {
        Fifo {
            items: VecDeque::new(),
            on_evict,
        }
    }

    /// Creates a FIFO that ignores evictions. Useful in tests.
    pub fn unobserved() -> Self {
        Fifo::new(Box::new(|_, _, _| {}))
    }

    /// Appends an entry at the tail.
    ///
    /// Always appends, even when the key is already present: the consumer is
    /// responsible for not re-adding, and duplicate keys are legal here.
    pub fn add(&mut self, id: RecordId, record: Arc<Record>) -> bool {
        self.items.push_back((id, record));
        true
    }

    /// Returns the first entry with the given key, in insertion order.
    pub fn get(&self, id: RecordId) -> Option<Arc<Record>> {
        self.items
            .iter()
            .find(|(key, _)| *key == id)
            .map(|(_, rec)| rec.clone())
    }

    /// Returns true if any entry has the given key.
    pub fn contains(&self, id: RecordId) -> bool {
        self.items.iter().any(|(key, _)| *key == id)
    }

    /// Removes the first entry with the given key, firing `Removed`.
    pub fn remove(&mut self, id: RecordId) -> bool {
        if let Some(index) = self.items.iter().position(|(key, _)| *key == id) {
            let (key, rec) = self.items.remove(index).unwrap();
            (self.on_evict)(EvictReason::Removed, &key, &rec);
            true
        } else {
            false
        }
    }

    /// Removes and returns the head entry, firing `Popped`.
    pub fn pop(&mut self) -> Option<(RecordId, Arc<Record>)> {
        let (id, rec) = self.items.pop_front()?;
        (self.on_evict)(EvictReason::Popped, &id, &rec);
        Some((id, rec))
    }

    /// Removes every entry, firing `Purged` for each.
    pub fn purge(&mut self) {
        while let Some((id, rec)) = self.items.pop_front() {
            (self.on_evict)(EvictReason::Purged, &id, &rec);
        }
    }

    /// Snapshot of the keys in insertion order.
    pub fn keys(&self) -> Vec<RecordId> {
        self.items.iter().map(|(id, _)| *id).collect()
    }

    /// Snapshot of the entries in insertion order.
    pub fn slice(&self) -> Vec<(RecordId, Arc<Record>)> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Walks entries head-first, removing each one the callback accepts.
    ///
    /// Stops at the first callback error: that entry and everything after it
    /// stay in the FIFO in their original order. Each successfully processed
    /// entry fires `Dequeued`. Returns the processed entries and the error,
    /// if any. On full success the FIFO is left empty.
    pub async fn drain<F, Fut, E>(&mut self, mut f: F) -> (Vec<(RecordId, Arc<Record>)>, Option<E>)
    where
        F: FnMut(RecordId, Arc<Record>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let mut drained = Vec::new();
        while let Some((id, rec)) = self.items.front().cloned() {
            if let Err(err) = f(id, rec.clone()).await {
                return (drained, Some(err));
            }
            self.items.pop_front();
            (self.on_evict)(EvictReason::Dequeued, &id, &rec);
            drained.push((id, rec));
        }
        (drained, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Receipt, SourceId};
    use proptest::prelude::*;
    use std::sync::Mutex;

    fn record(n: usize) -> Arc<Record> {
        Record::new(
            SourceId::new(format!("m-{n}")),
            Receipt::new(format!("r-{n}")),
            format!("body-{n}"),
        )
        .shared()
    }

    /// A FIFO whose evictions are captured for assertions.
    fn observed() -> (Fifo, Arc<Mutex<Vec<(EvictReason, RecordId)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let fifo = Fifo::new(Box::new(move |reason, id, _| {
            sink.lock().unwrap().push((reason, *id));
        }));
        (fifo, seen)
    }

    // ─── Basic operations ───

    #[test]
    fn new_fifo_is_empty() {
        let fifo = Fifo::unobserved();
        assert!(fifo.is_empty());
        assert_eq!(fifo.len(), 0);
    }

    #[test]
    fn add_appends_at_tail() {
        let mut fifo = Fifo::unobserved();
        let recs: Vec<_> = (0..3).map(record).collect();
        for rec in &recs {
            assert!(fifo.add(rec.id(), rec.clone()));
        }

        let expected: Vec<_> = recs.iter().map(|r| r.id()).collect();
        assert_eq!(fifo.keys(), expected);
    }

    #[test]
    fn add_allows_duplicate_keys() {
        let mut fifo = Fifo::unobserved();
        let rec = record(0);
        fifo.add(rec.id(), rec.clone());
        fifo.add(rec.id(), rec.clone());
        assert_eq!(fifo.len(), 2);
    }

    #[test]
    fn get_returns_first_match() {
        let mut fifo = Fifo::unobserved();
        let rec = record(0);
        fifo.add(rec.id(), rec.clone());

        let found = fifo.get(rec.id()).unwrap();
        assert_eq!(found.id(), rec.id());
        assert!(fifo.get(RecordId::random()).is_none());
    }

    #[test]
    fn contains_and_remove() {
        let (mut fifo, seen) = observed();
        let rec = record(0);
        fifo.add(rec.id(), rec.clone());

        assert!(fifo.contains(rec.id()));
        assert!(fifo.remove(rec.id()));
        assert!(!fifo.contains(rec.id()));
        assert!(!fifo.remove(rec.id()));

        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[(EvictReason::Removed, rec.id())]
        );
    }

    #[test]
    fn pop_takes_the_head() {
        let (mut fifo, seen) = observed();
        let first = record(0);
        let second = record(1);
        fifo.add(first.id(), first.clone());
        fifo.add(second.id(), second.clone());

        let (id, _) = fifo.pop().unwrap();
        assert_eq!(id, first.id());
        assert_eq!(fifo.len(), 1);
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            &[(EvictReason::Popped, first.id())]
        );
    }

    #[test]
    fn pop_empty_returns_none() {
        let mut fifo = Fifo::unobserved();
        assert!(fifo.pop().is_none());
    }

    #[test]
    fn purge_fires_eviction_for_every_entry() {
        let (mut fifo, seen) = observed();
        let recs: Vec<_> = (0..4).map(record).collect();
        for rec in &recs {
            fifo.add(rec.id(), rec.clone());
        }

        fifo.purge();

        assert!(fifo.is_empty());
        let evictions = seen.lock().unwrap();
        assert_eq!(evictions.len(), 4);
        for ((reason, id), rec) in evictions.iter().zip(&recs) {
            assert_eq!(*reason, EvictReason::Purged);
            assert_eq!(*id, rec.id());
        }
    }

    // ─── Drain ───

    #[tokio::test]
    async fn drain_full_success_empties_the_fifo() {
        let (mut fifo, seen) = observed();
        let recs: Vec<_> = (0..3).map(record).collect();
        for rec in &recs {
            fifo.add(rec.id(), rec.clone());
        }

        let (drained, err) = fifo
            .drain(|_, _| async { Ok::<(), ()>(()) })
            .await;

        assert!(err.is_none());
        assert!(fifo.is_empty());
        let drained_ids: Vec<_> = drained.iter().map(|(id, _)| *id).collect();
        let expected: Vec<_> = recs.iter().map(|r| r.id()).collect();
        assert_eq!(drained_ids, expected);
        assert!(seen
            .lock()
            .unwrap()
            .iter()
            .all(|(reason, _)| *reason == EvictReason::Dequeued));
    }

    #[tokio::test]
    async fn drain_stops_at_first_failure() {
        let mut fifo = Fifo::unobserved();
        let recs: Vec<_> = (0..4).map(record).collect();
        for rec in &recs {
            fifo.add(rec.id(), rec.clone());
        }

        // Fail on the third entry.
        let poison = recs[2].id();
        let (drained, err) = fifo
            .drain(|id, _| async move { if id == poison { Err("boom") } else { Ok(()) } })
            .await;

        assert_eq!(err, Some("boom"));
        assert_eq!(drained.len(), 2);
        // The failing entry and its successor remain, in order.
        assert_eq!(fifo.keys(), vec![recs[2].id(), recs[3].id()]);
    }

    #[tokio::test]
    async fn drain_on_empty_fifo_is_a_noop() {
        let mut fifo = Fifo::unobserved();
        let (drained, err) = fifo.drain(|_, _| async { Ok::<(), ()>(()) }).await;
        assert!(drained.is_empty());
        assert!(err.is_none());
    }

    // ─── Property tests ───

    proptest! {
        /// Drain passes entries to the callback in exact insertion order, up
        /// to the first failure, and leaves the tail untouched.
        #[test]
        fn prop_drain_preserves_insertion_order(
            count in 1usize..12,
            fail_at in proptest::option::of(0usize..12),
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            rt.block_on(async {
                let mut fifo = Fifo::unobserved();
                let recs: Vec<_> = (0..count).map(record).collect();
                for rec in &recs {
                    fifo.add(rec.id(), rec.clone());
                }

                let fail_index = fail_at.filter(|i| *i < count);
                let mut called = Vec::new();
                let (drained, err) = fifo
                    .drain(|id, _| {
                        called.push(id);
                        let fail = fail_index == Some(called.len() - 1);
                        async move { if fail { Err(()) } else { Ok(()) } }
                    })
                    .await;

                let expected: Vec<_> = recs.iter().map(|r| r.id()).collect();
                match fail_index {
                    Some(i) => {
                        prop_assert!(err.is_some());
                        prop_assert_eq!(&called[..], &expected[..=i]);
                        prop_assert_eq!(drained.len(), i);
                        prop_assert_eq!(fifo.keys(), expected[i..].to_vec());
                    }
                    None => {
                        prop_assert!(err.is_none());
                        prop_assert_eq!(called, expected);
                        prop_assert!(fifo.is_empty());
                    }
                }
                Ok(())
            }).unwrap();
        }

        /// Length always reflects adds minus removals.
        #[test]
        fn prop_len_is_accurate(adds in 0usize..20, pops in 0usize..20) {
            let mut fifo = Fifo::unobserved();
            for n in 0..adds {
                let rec = record(n);
                fifo.add(rec.id(), rec);
            }
            let popped = pops.min(adds);
            for _ in 0..popped {
                fifo.pop().unwrap();
            }
            prop_assert_eq!(fifo.len(), adds - popped);
        }
    }
}
