//! Test utilities and mock types for Warren development.
//!
//! Provides mock implementations of core traits ([`Lockable`], [`Dice`],
//! [`Sink`]) and world fixtures for building test scenarios.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use warren_core::{Dice, LockId, Lockable, Sink};

pub use fixtures::*;

// ── Journal ──────────────────────────────────────────────────────

/// One entry in a [`Journal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockEvent {
    Acquired(LockId),
    Released(LockId),
}

/// Shared log of lock acquisitions and releases across many
/// [`CountingLock`]s.
#[derive(Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<LockEvent>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: LockEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn events(&self) -> Vec<LockEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ids in the order they were acquired.
    pub fn acquired(&self) -> Vec<LockId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LockEvent::Acquired(id) => Some(id),
                LockEvent::Released(_) => None,
            })
            .collect()
    }

    /// Ids in the order they were released.
    pub fn released(&self) -> Vec<LockId> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LockEvent::Released(id) => Some(id),
                LockEvent::Acquired(_) => None,
            })
            .collect()
    }

    /// Locks acquired and not yet released.
    pub fn outstanding(&self) -> usize {
        let events = self.events();
        let acquired = events
            .iter()
            .filter(|e| matches!(e, LockEvent::Acquired(_)))
            .count();
        acquired - (events.len() - acquired)
    }

    /// Every acquire has a matching release.
    pub fn is_balanced(&self) -> bool {
        self.outstanding() == 0
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

// ── CountingLock ─────────────────────────────────────────────────

/// A lock handle stub that records every acquire and release in a
/// [`Journal`]. Protects a `u32` the test can use as a counter.
pub struct CountingLock {
    id: LockId,
    data: Mutex<u32>,
    journal: Journal,
}

impl CountingLock {
    pub fn new(journal: &Journal) -> Self {
        Self {
            id: LockId::next(),
            data: Mutex::new(0),
            journal: journal.clone(),
        }
    }
}

/// Guard for a [`CountingLock`]; journals the release on drop.
pub struct CountingGuard<'a> {
    inner: MutexGuard<'a, u32>,
    id: LockId,
    journal: &'a Journal,
}

impl Deref for CountingGuard<'_> {
    type Target = u32;

    fn deref(&self) -> &u32 {
        &self.inner
    }
}

impl DerefMut for CountingGuard<'_> {
    fn deref_mut(&mut self) -> &mut u32 {
        &mut self.inner
    }
}

impl Drop for CountingGuard<'_> {
    fn drop(&mut self) {
        self.journal.push(LockEvent::Released(self.id));
    }
}

impl Lockable for CountingLock {
    type Data = u32;
    type Guard<'a> = CountingGuard<'a>;

    fn lock_id(&self) -> LockId {
        self.id
    }

    fn lock(&self) -> CountingGuard<'_> {
        let inner = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        self.journal.push(LockEvent::Acquired(self.id));
        CountingGuard {
            inner,
            id: self.id,
            journal: &self.journal,
        }
    }
}

// ── LoadedDice ───────────────────────────────────────────────────

/// Scripted dice. Each roll takes the next queued value (reduced modulo
/// `n`); once the script runs out every roll is `fallback`.
pub struct LoadedDice {
    script: Mutex<VecDeque<u64>>,
    fallback: u64,
}

impl LoadedDice {
    pub fn new(script: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: 0,
        }
    }

    /// Every roll returns `value` (modulo `n`).
    pub fn always(value: u64) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: value,
        }
    }

    /// Append more rolls to the script.
    pub fn push(&self, rolls: impl IntoIterator<Item = u64>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(rolls);
    }

    /// Rolls still queued.
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Dice for LoadedDice {
    fn below(&self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(self.fallback);
        next % n
    }
}

// ── Inbox ────────────────────────────────────────────────────────

/// Receiving end of a test player's sink.
pub struct Inbox {
    rx: Receiver<String>,
}

impl Inbox {
    /// A connected sink and the inbox reading from it.
    pub fn pair() -> (Arc<dyn Sink>, Inbox) {
        let (tx, rx): (Sender<String>, Receiver<String>) = crossbeam_channel::unbounded();
        (Arc::new(tx), Inbox { rx })
    }

    /// Drain every message delivered so far.
    pub fn messages(&self) -> Vec<String> {
        self.rx.try_iter().collect()
    }

    /// Drain and join everything delivered so far.
    pub fn text(&self) -> String {
        self.messages().join("\n")
    }

    /// Wait until a message containing `needle` arrives, discarding
    /// others. Returns the matching message.
    pub fn wait_for(&self, needle: &str, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(left) {
                Ok(msg) if msg.contains(needle) => return Some(msg),
                Ok(_) => {}
                Err(_) => return None,
            }
        }
    }
}
