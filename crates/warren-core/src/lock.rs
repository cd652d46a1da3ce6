//! The lock-handle contract consumed by the execution cycle.

use std::ops::DerefMut;

use crate::id::LockId;

/// A container that can be locked as part of a command's resource set.
///
/// Locking returns an RAII guard giving exclusive access to the data the
/// lock protects; dropping the guard releases the lock. Every lockable
/// container has a stable [`LockId`] that fixes the global acquisition
/// order, which is the only thing preventing circular waits between
/// concurrent commands.
///
/// Implementors must not hand out two containers with the same `LockId`.
pub trait Lockable: Send + Sync {
    /// The state protected by the lock.
    type Data;

    /// Guard returned by [`lock`](Self::lock). Releases on drop.
    type Guard<'a>: DerefMut<Target = Self::Data>
    where
        Self: 'a;

    /// The stable ordering key of this container.
    fn lock_id(&self) -> LockId;

    /// Block until the lock is acquired.
    fn lock(&self) -> Self::Guard<'_>;
}
