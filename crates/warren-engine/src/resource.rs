//! The per-invocation resource set: lock handles kept in acquisition order.
//!
//! Every command invocation owns exactly one [`ResourceSet`]. It starts with
//! the actor's container (if any) and only ever grows. Handles are kept
//! sorted ascending by [`LockId`], so iterating the set is the global
//! acquisition order and concurrent invocations can never wait on each
//! other in a cycle.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use warren_core::{LockId, Lockable};

/// Inline capacity: most commands touch one container, moves touch two.
pub(crate) const INLINE_LOCKS: usize = 2;

/// Handles in ascending lock order.
pub type LockList<T> = SmallVec<[Arc<T>; INLINE_LOCKS]>;

/// An ordered, duplicate-free set of lock handles.
pub struct ResourceSet<T: Lockable> {
    locks: LockList<T>,
}

impl<T: Lockable> ResourceSet<T> {
    /// An empty set.
    pub fn new() -> Self {
        Self {
            locks: SmallVec::new(),
        }
    }

    /// A set holding `seed`, or an empty set for an unplaced actor.
    pub fn seeded(seed: Option<&Arc<T>>) -> Self {
        let mut set = Self::new();
        if let Some(handle) = seed {
            set.add_lock(handle);
        }
        set
    }

    /// Insert `handle` at its position in lock order.
    ///
    /// Returns `false` (and changes nothing) if the same handle is already
    /// present. Identity is pointer identity, not `LockId` equality.
    pub fn add_lock(&mut self, handle: &Arc<T>) -> bool {
        if self.can_lock(handle) {
            return false;
        }

        self.locks.push(Arc::clone(handle));
        let len = self.locks.len();
        if len == 1 {
            return true;
        }

        let id = handle.lock_id();
        if let Some(at) = self.locks[..len - 1]
            .iter()
            .position(|held| held.lock_id() > id)
        {
            // Shift the tail right by one and drop the new handle into the gap.
            self.locks[at..].rotate_right(1);
        }
        true
    }

    /// Whether `handle` is in the set. Says nothing about whether its lock
    /// is currently held.
    pub fn can_lock(&self, handle: &Arc<T>) -> bool {
        self.locks.iter().any(|held| Arc::ptr_eq(held, handle))
    }

    /// Number of handles.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether the set is empty (the actor is not placed anywhere).
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Handles in acquisition order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.locks.iter()
    }

    /// Lock ids in acquisition order.
    pub fn lock_ids(&self) -> Vec<LockId> {
        self.locks.iter().map(|l| l.lock_id()).collect()
    }

    /// A copy of the handles for one acquisition pass.
    pub fn snapshot(&self) -> LockList<T> {
        self.locks.clone()
    }
}

impl<T: Lockable> Default for ResourceSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Lockable> fmt::Debug for ResourceSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.lock_ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use warren_test_utils::{CountingLock, Journal};

    fn locks(n: usize) -> Vec<Arc<CountingLock>> {
        let journal = Journal::new();
        (0..n)
            .map(|_| Arc::new(CountingLock::new(&journal)))
            .collect()
    }

    fn is_sorted(ids: &[LockId]) -> bool {
        ids.windows(2).all(|w| w[0] < w[1])
    }

    #[test]
    fn seeded_with_none_is_empty() {
        let set: ResourceSet<CountingLock> = ResourceSet::seeded(None);
        assert!(set.is_empty());
    }

    #[test]
    fn insert_before_existing() {
        let l = locks(3);
        let mut set = ResourceSet::seeded(Some(&l[2]));
        assert!(set.add_lock(&l[0]));
        assert!(set.add_lock(&l[1]));
        assert_eq!(set.lock_ids(), vec![l[0].lock_id(), l[1].lock_id(), l[2].lock_id()]);
    }

    #[test]
    fn duplicate_is_noop() {
        let l = locks(2);
        let mut set = ResourceSet::new();
        set.add_lock(&l[1]);
        set.add_lock(&l[0]);
        let before = set.lock_ids();
        assert!(!set.add_lock(&l[1]));
        assert!(!set.add_lock(&l[0]));
        assert_eq!(set.lock_ids(), before);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn can_lock_is_membership_only() {
        let l = locks(2);
        let set = ResourceSet::seeded(Some(&l[0]));
        assert!(set.can_lock(&l[0]));
        assert!(!set.can_lock(&l[1]));
    }

    proptest! {
        #[test]
        fn any_insertion_order_yields_sorted_set(
            order in Just((0..8usize).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let l = locks(8);
            let mut set = ResourceSet::new();
            for &i in &order {
                prop_assert!(set.add_lock(&l[i]));
            }
            let ids = set.lock_ids();
            prop_assert!(is_sorted(&ids));
            prop_assert_eq!(ids, l.iter().map(|h| h.lock_id()).collect::<Vec<_>>());
        }

        #[test]
        fn repeated_inserts_keep_set_unique(
            picks in proptest::collection::vec(0..5usize, 1..40)
        ) {
            let l = locks(5);
            let mut set = ResourceSet::new();
            let mut distinct = std::collections::BTreeSet::new();
            for &i in &picks {
                let added = set.add_lock(&l[i]);
                prop_assert_eq!(added, distinct.insert(i));
            }
            prop_assert_eq!(set.len(), distinct.len());
            prop_assert!(is_sorted(&set.lock_ids()));
        }
    }
}
