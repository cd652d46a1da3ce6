//! Execution metrics for the engine.
//!
//! [`EngineMetrics`] is updated by every invocation with relaxed atomics;
//! [`MetricsSnapshot`] is the copy handed to callers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative counters shared by every thread executing commands.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    commands_executed: AtomicU64,
    total_passes: AtomicU64,
    relock_passes: AtomicU64,
    max_passes: AtomicU64,
    events_fired: AtomicU64,
    stale_events: AtomicU64,
    handler_panics: AtomicU64,
}

impl EngineMetrics {
    /// Record one finished invocation that took `passes` passes.
    pub(crate) fn record_execution(&self, passes: u32) {
        let passes = u64::from(passes);
        self.commands_executed.fetch_add(1, Ordering::Relaxed);
        self.total_passes.fetch_add(passes, Ordering::Relaxed);
        self.relock_passes
            .fetch_add(passes.saturating_sub(1), Ordering::Relaxed);
        self.max_passes.fetch_max(passes, Ordering::Relaxed);
    }

    /// Record a scheduled event entering the cycle.
    pub(crate) fn record_event(&self, stale: bool) {
        self.events_fired.fetch_add(1, Ordering::Relaxed);
        if stale {
            self.stale_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a handler panic.
    pub(crate) fn record_panic(&self) {
        self.handler_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_executed: self.commands_executed.load(Ordering::Relaxed),
            total_passes: self.total_passes.load(Ordering::Relaxed),
            relock_passes: self.relock_passes.load(Ordering::Relaxed),
            max_passes: self.max_passes.load(Ordering::Relaxed),
            events_fired: self.events_fired.load(Ordering::Relaxed),
            stale_events: self.stale_events.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Invocations that ran to completion, typed or scheduled.
    pub commands_executed: u64,
    /// Passes made across all invocations.
    pub total_passes: u64,
    /// Passes repeated because the resource set grew.
    pub relock_passes: u64,
    /// Most passes any single invocation needed.
    pub max_passes: u64,
    /// Scheduled events executed by dispatch workers.
    pub events_fired: u64,
    /// Scheduled events that no longer applied when executed.
    pub stale_events: u64,
    /// Invocations whose handler panicked.
    pub handler_panics: u64,
}
