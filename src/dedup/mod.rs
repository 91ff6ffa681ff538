//! Bounded fingerprint set used to drop intra-window redeliveries.
//!
//! The source is at-least-once: a record that was committed can reappear
//! once its visibility window lapses on the source side. The dedup store
//! remembers the source ids of recently committed records so Gather can
//! drop those redeliveries instead of forwarding them twice.
//!
//! The store is keyed on the source-assigned id, not the local record id:
//! the local id is regenerated on every delivery attempt, so it would never
//! match a redelivery.
//!
//! This is a locality filter, not a correctness mechanism. Its capacity and
//! the source's visibility timeout together bound the redelivery window it
//! can suppress; anything that escapes it must be absorbed by downstream
//! idempotence.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::types::{Record, SourceId};

/// Bounded FIFO set of recently processed source ids.
///
/// When the configured capacity is exceeded, the oldest fingerprint is
/// evicted. A capacity of zero disables suppression entirely: nothing is
/// retained and every record passes through.
#[derive(Debug)]
pub struct DedupStore {
    capacity: usize,
    order: VecDeque<SourceId>,
    present: HashSet<SourceId>,
}

impl DedupStore {
    pub fn new(capacity: usize) -> Self {
        DedupStore {
            capacity,
            order: VecDeque::new(),
            present: HashSet::new(),
        }
    }

    /// Adds a fingerprint, evicting the oldest entry if the store is full.
    ///
    /// Re-adding a fingerprint already in the store is a no-op, so the store
    /// never grows past its capacity through repeats.
    pub fn add(&mut self, id: SourceId) {
        if self.capacity == 0 || self.present.contains(&id) {
            return;
        }
        self.order.push_back(id.clone());
        self.present.insert(id);
        if self.order.len() > self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.present.remove(&oldest);
        }
    }

    /// Returns true if the fingerprint was added and has not been evicted.
    pub fn contains(&self, id: &SourceId) -> bool {
        self.present.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Splits records into those already fingerprinted and those not.
    ///
    /// Both sides preserve the input order. Together they are a permutation
    /// of the input: every record lands in exactly one side.
    pub fn intersect(
        &self,
        records: Vec<Arc<Record>>,
    ) -> (Vec<Arc<Record>>, Vec<Arc<Record>>) {
        let mut present = Vec::new();
        let mut absent = Vec::new();
        for record in records {
            if self.contains(record.source_id()) {
                present.push(record);
            } else {
                absent.push(record);
            }
        }
        (present, absent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Receipt;
    use proptest::prelude::*;

    fn source(n: usize) -> SourceId {
        SourceId::new(format!("m-{n}"))
    }

    fn record(n: usize) -> Arc<Record> {
        Record::new(source(n), Receipt::new(format!("r-{n}")), format!("b-{n}")).shared()
    }

    #[test]
    fn add_then_contains() {
        let mut store = DedupStore::new(4);
        store.add(source(1));
        assert!(store.contains(&source(1)));
        assert!(!store.contains(&source(2)));
    }

    #[test]
    fn crossing_capacity_evicts_the_oldest() {
        let mut store = DedupStore::new(2);
        store.add(source(1));
        store.add(source(2));
        store.add(source(3));

        assert!(!store.contains(&source(1)));
        assert!(store.contains(&source(2)));
        assert!(store.contains(&source(3)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn repeated_add_does_not_grow_the_store() {
        let mut store = DedupStore::new(2);
        store.add(source(1));
        store.add(source(1));
        store.add(source(1));

        assert_eq!(store.len(), 1);
        assert!(store.contains(&source(1)));
    }

    #[test]
    fn zero_capacity_disables_suppression() {
        let mut store = DedupStore::new(0);
        store.add(source(1));
        assert!(!store.contains(&source(1)));
        assert!(store.is_empty());

        let (present, absent) = store.intersect(vec![record(1), record(2)]);
        assert!(present.is_empty());
        assert_eq!(absent.len(), 2);
    }

    #[test]
    fn intersect_splits_by_membership_in_input_order() {
        let mut store = DedupStore::new(8);
        store.add(source(0));
        store.add(source(2));

        let input: Vec<_> = (0..4).map(record).collect();
        let (present, absent) = store.intersect(input);

        let present_ids: Vec<_> = present.iter().map(|r| r.source_id().clone()).collect();
        let absent_ids: Vec<_> = absent.iter().map(|r| r.source_id().clone()).collect();
        assert_eq!(present_ids, vec![source(0), source(2)]);
        assert_eq!(absent_ids, vec![source(1), source(3)]);
    }

    proptest! {
        /// present ∪ absent is the input as a multiset, and the sides are
        /// disjoint by membership.
        #[test]
        fn prop_intersect_partitions_the_input(
            capacity in 0usize..8,
            stored in prop::collection::vec(0usize..10, 0..8),
            queried in prop::collection::vec(0usize..10, 0..12),
        ) {
            let mut store = DedupStore::new(capacity);
            for n in stored {
                store.add(source(n));
            }

            let input: Vec<_> = queried.iter().map(|n| record(*n)).collect();
            let input_ids: Vec<_> = input.iter().map(|r| r.id()).collect();
            let (present, absent) = store.intersect(input);

            prop_assert_eq!(present.len() + absent.len(), input_ids.len());
            for rec in &present {
                prop_assert!(store.contains(rec.source_id()));
            }
            for rec in &absent {
                prop_assert!(!store.contains(rec.source_id()));
            }

            // Every input record lands in exactly one side.
            let mut combined: Vec<_> = present
                .iter()
                .chain(absent.iter())
                .map(|r| r.id())
                .collect();
            combined.sort_by_key(|id| id.to_string());
            let mut expected = input_ids;
            expected.sort_by_key(|id| id.to_string());
            prop_assert_eq!(combined, expected);
        }

        /// The store never exceeds its capacity, whatever is added.
        #[test]
        fn prop_len_is_bounded_by_capacity(
            capacity in 0usize..6,
            adds in prop::collection::vec(0usize..20, 0..40),
        ) {
            let mut store = DedupStore::new(capacity);
            for n in adds {
                store.add(source(n));
                prop_assert!(store.len() <= capacity);
            }
        }

        /// A fingerprint added after the last eviction that removed it is
        /// reported as contained.
        #[test]
        fn prop_recent_adds_are_contained(adds in prop::collection::vec(0usize..6, 1..20)) {
            let mut store = DedupStore::new(6);
            for n in &adds {
                store.add(source(*n));
            }
            // Capacity covers the whole key space, so nothing was evicted.
            for n in &adds {
                prop_assert!(store.contains(&source(*n)));
            }
        }
    }
}
