//! Scheduled event kinds and the cooperative [`CancelToken`].
//!
//! A token is shared between the scheduler's timer entry and the slot on
//! the owning thing. It moves exactly once out of the *pending* state,
//! either to *fired* (the timer won) or to *cancelled* (someone cancelled
//! first). Cancelling never implies that the owning thing is destroyed.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

const PENDING: u8 = 0;
const FIRED: u8 = 1;
const CANCELLED: u8 = 2;

/// The named action a scheduled event performs when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    /// Ambient flavour message, rescheduled indefinitely.
    Action,
    /// One round of a combat session.
    Combat,
    /// Health regeneration tick.
    Health,
    /// Removal of a decaying thing such as a corpse.
    Cleanup,
}

impl EventKind {
    /// Number of distinct kinds, for per-kind slot arrays.
    pub const COUNT: usize = 4;

    /// All kinds in slot order.
    pub const ALL: [EventKind; Self::COUNT] = [
        EventKind::Action,
        EventKind::Combat,
        EventKind::Health,
        EventKind::Cleanup,
    ];

    /// The internal command verb used when the event re-enters the
    /// execution cycle. Starts with `$` so players cannot type it.
    pub fn verb(self) -> &'static str {
        match self {
            Self::Action => "$ACTION",
            Self::Combat => "$COMBAT",
            Self::Health => "$HEALTH",
            Self::Cleanup => "$CLEANUP",
        }
    }

    /// Map an internal verb back to its kind.
    pub fn from_verb(verb: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.verb() == verb)
    }

    /// Index into a `[_; EventKind::COUNT]` slot array.
    pub fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Opaque, cloneable cancellation handle for one scheduled event.
///
/// Clones share state; identity is compared with [`same_as`](Self::same_as).
#[derive(Clone, Debug)]
pub struct CancelToken {
    state: Arc<AtomicU8>,
}

impl CancelToken {
    /// Issue a new token in the pending state.
    pub fn issue() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
        }
    }

    /// Cancel the event. Idempotent.
    ///
    /// Returns `true` only for the call that moved the token from pending
    /// to cancelled. Cancelling a fired or already cancelled token is a
    /// no-op returning `false`.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claim the token for firing. Returns `false` if it was cancelled
    /// (or already fired) first.
    pub fn try_fire(&self) -> bool {
        self.state
            .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Whether the token has been claimed by the timer.
    pub fn is_fired(&self) -> bool {
        self.state.load(Ordering::Acquire) == FIRED
    }

    /// Whether the event is still waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) == PENDING
    }

    /// Identity comparison: do both handles refer to the same event?
    pub fn same_as(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

/// The slot a thing keeps for one pending event of a given kind.
#[derive(Clone, Debug)]
pub struct Pending {
    /// Handle used to cancel the event.
    pub token: CancelToken,
    /// When the event is due to fire.
    pub due: Instant,
}
