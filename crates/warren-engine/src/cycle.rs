//! The command execution cycle.
//!
//! [`run`] repeatedly locks every handle in a cycle's [`ResourceSet`] in
//! ascending [`LockId`] order, invokes the cycle's effect logic once, and
//! compares the set's length before and after. If the effect logic added a
//! lock, every guard is released and the pass starts again with the larger
//! set. When the set is stable the cycle settles (still under the locks)
//! and returns.
//!
//! Sets only grow, so a length comparison detects change. The number of
//! containers an invocation can reference is finite, so the loop ends.

use std::sync::Arc;

use smallvec::SmallVec;
use tracing::trace;
use warren_core::{LockId, Lockable};

use crate::resource::{ResourceSet, INLINE_LOCKS};

// ── Held ─────────────────────────────────────────────────────────

/// The guards taken for one pass, in acquisition order.
///
/// Dropping a `Held` releases every guard in reverse acquisition order.
/// This also happens while unwinding out of a panicking handler.
pub struct Held<'a, T: Lockable + 'a> {
    guards: SmallVec<[(&'a Arc<T>, T::Guard<'a>); INLINE_LOCKS]>,
}

impl<'a, T: Lockable + 'a> Held<'a, T> {
    /// Block until every handle is locked, in the order given.
    ///
    /// `handles` must be in ascending lock order and duplicate-free, as a
    /// [`ResourceSet`] snapshot is.
    pub fn acquire(handles: &'a [Arc<T>]) -> Self {
        debug_assert!(
            handles.windows(2).all(|w| w[0].lock_id() < w[1].lock_id()),
            "handles must be in ascending lock order"
        );
        let mut guards = SmallVec::with_capacity(handles.len());
        for handle in handles {
            let guard = handle.lock();
            trace!(lock = %handle.lock_id(), "lock acquired");
            guards.push((handle, guard));
        }
        Self { guards }
    }

    fn position(&self, handle: &Arc<T>) -> Option<usize> {
        self.guards.iter().position(|(h, _)| Arc::ptr_eq(h, handle))
    }

    /// Whether `handle` is locked in this pass.
    pub fn holds(&self, handle: &Arc<T>) -> bool {
        self.position(handle).is_some()
    }

    /// Shared access to a held container's data.
    pub fn get(&self, handle: &Arc<T>) -> Option<&T::Data> {
        let at = self.position(handle)?;
        Some(&*self.guards[at].1)
    }

    /// Exclusive access to a held container's data.
    pub fn get_mut(&mut self, handle: &Arc<T>) -> Option<&mut T::Data> {
        let at = self.position(handle)?;
        Some(&mut *self.guards[at].1)
    }

    /// Look a held container up by lock id.
    pub fn by_id(&self, id: LockId) -> Option<(&Arc<T>, &T::Data)> {
        self.guards
            .iter()
            .find(|(h, _)| h.lock_id() == id)
            .map(|(h, g)| (*h, &**g))
    }

    /// Exclusive access to two distinct held containers at once.
    ///
    /// Returns `None` if either is not held or both are the same.
    pub fn pair_mut(
        &mut self,
        a: &Arc<T>,
        b: &Arc<T>,
    ) -> Option<(&mut T::Data, &mut T::Data)> {
        let i = self.position(a)?;
        let j = self.position(b)?;
        if i == j {
            return None;
        }
        if i < j {
            let (left, right) = self.guards.split_at_mut(j);
            Some((&mut *left[i].1, &mut *right[0].1))
        } else {
            let (left, right) = self.guards.split_at_mut(i);
            Some((&mut *right[0].1, &mut *left[j].1))
        }
    }

    /// Held handles in acquisition order.
    pub fn handles(&self) -> impl Iterator<Item = &Arc<T>> + use<'_, 'a, T> {
        self.guards.iter().map(|(h, _)| *h)
    }

    /// Lock ids in acquisition order.
    pub fn lock_ids(&self) -> Vec<LockId> {
        self.guards.iter().map(|(h, _)| h.lock_id()).collect()
    }

    /// Number of guards held.
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl<'a, T: Lockable + 'a> Drop for Held<'a, T> {
    fn drop(&mut self) {
        while let Some((handle, guard)) = self.guards.pop() {
            drop(guard);
            trace!(lock = %handle.lock_id(), "lock released");
        }
    }
}

// ── Cycle ────────────────────────────────────────────────────────

/// Effect logic driven by [`run`].
pub trait Cycle<T: Lockable> {
    /// The set of locks the next pass must hold.
    fn resources(&self) -> &ResourceSet<T>;

    /// One pass of effect logic with every lock in
    /// [`resources`](Self::resources) held.
    ///
    /// To ask for more locks, add them to the resource set and return
    /// before mutating anything. The pass is then repeated from the top
    /// with the larger set.
    fn pass(&mut self, held: &mut Held<'_, T>);

    /// Called once, under the locks of the final pass, after a pass that
    /// did not grow the set.
    fn settle(&mut self, _held: &mut Held<'_, T>) {}
}

/// Drive `cycle` until its resource set stops growing. Returns the number
/// of passes made (at least one).
pub fn run<T: Lockable, C: Cycle<T>>(cycle: &mut C) -> u32 {
    let mut passes = 0u32;
    loop {
        let before = cycle.resources().len();
        let handles = cycle.resources().snapshot();
        let mut held = Held::acquire(&handles);
        passes += 1;

        cycle.pass(&mut held);

        if cycle.resources().len() == before {
            cycle.settle(&mut held);
            return passes;
        }
        trace!(
            pass = passes,
            from = before,
            to = cycle.resources().len(),
            "resource set grew, relocking"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_test_utils::{CountingLock, Journal};

    /// Adds the next lock from `wanted` on each pass until all are held.
    struct Grower {
        set: ResourceSet<CountingLock>,
        wanted: Vec<Arc<CountingLock>>,
        passes_seen: Vec<usize>,
        settled_with: Option<usize>,
    }

    impl Cycle<CountingLock> for Grower {
        fn resources(&self) -> &ResourceSet<CountingLock> {
            &self.set
        }

        fn pass(&mut self, held: &mut Held<'_, CountingLock>) {
            self.passes_seen.push(held.len());
            if let Some(next) = self.wanted.iter().find(|w| !self.set.can_lock(w)) {
                let next = Arc::clone(next);
                self.set.add_lock(&next);
                return;
            }
            for handle in self.set.iter() {
                if let Some(count) = held.get_mut(handle) {
                    *count += 1;
                }
            }
        }

        fn settle(&mut self, held: &mut Held<'_, CountingLock>) {
            self.settled_with = Some(held.len());
        }
    }

    #[test]
    fn stable_set_takes_one_pass() {
        let journal = Journal::new();
        let a = Arc::new(CountingLock::new(&journal));
        let mut cycle = Grower {
            set: ResourceSet::seeded(Some(&a)),
            wanted: vec![],
            passes_seen: vec![],
            settled_with: None,
        };
        assert_eq!(run(&mut cycle), 1);
        assert_eq!(cycle.settled_with, Some(1));
        assert_eq!(*a.lock(), 1);
        assert!(journal.is_balanced());
    }

    #[test]
    fn each_growth_costs_a_pass() {
        let journal = Journal::new();
        let l: Vec<_> = (0..3).map(|_| Arc::new(CountingLock::new(&journal))).collect();
        let mut cycle = Grower {
            set: ResourceSet::seeded(Some(&l[1])),
            wanted: vec![Arc::clone(&l[2]), Arc::clone(&l[0])],
            passes_seen: vec![],
            settled_with: None,
        };
        assert_eq!(run(&mut cycle), 3);
        assert_eq!(cycle.passes_seen, vec![1, 2, 3]);
        assert_eq!(cycle.settled_with, Some(3));
        // Only the final pass mutates.
        assert!(l.iter().all(|h| *h.lock() == 1));
        assert!(journal.is_balanced());
    }

    #[test]
    fn acquisition_follows_lock_order() {
        let journal = Journal::new();
        let l: Vec<_> = (0..3).map(|_| Arc::new(CountingLock::new(&journal))).collect();
        let mut set = ResourceSet::new();
        for h in l.iter().rev() {
            set.add_lock(h);
        }
        let handles = set.snapshot();
        {
            let held = Held::acquire(&handles);
            assert_eq!(held.lock_ids(), set.lock_ids());
        }
        let acquired = journal.acquired();
        assert_eq!(acquired, set.lock_ids());
        let mut released = journal.released();
        released.reverse();
        assert_eq!(released, acquired);
    }

    #[test]
    fn handles_follow_acquisition_order() {
        let journal = Journal::new();
        let l: Vec<_> = (0..3).map(|_| Arc::new(CountingLock::new(&journal))).collect();
        let mut set = ResourceSet::new();
        for h in [&l[2], &l[0], &l[1]] {
            set.add_lock(h);
        }
        let handles = set.snapshot();
        let held = Held::acquire(&handles);
        let seen: Vec<LockId> = held.handles().map(|h| h.lock_id()).collect();
        assert_eq!(seen, held.lock_ids());
        assert!(held.handles().zip(&l).all(|(a, b)| Arc::ptr_eq(a, b)));
    }

    #[test]
    fn pair_mut_rejects_same_handle() {
        let journal = Journal::new();
        let a = Arc::new(CountingLock::new(&journal));
        let b = Arc::new(CountingLock::new(&journal));
        let mut set = ResourceSet::seeded(Some(&a));
        set.add_lock(&b);
        let handles = set.snapshot();
        let mut held = Held::acquire(&handles);
        assert!(held.pair_mut(&a, &a).is_none());
        let (x, y) = held.pair_mut(&b, &a).unwrap();
        *x = 7;
        *y = 3;
        assert_eq!(held.get(&b), Some(&7));
        assert_eq!(held.get(&a), Some(&3));
    }
}
