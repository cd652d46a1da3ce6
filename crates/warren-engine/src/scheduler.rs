//! Cancellable, jittered event scheduler.
//!
//! A single timer thread owns every pending entry and their ordering. Other
//! threads talk to it over a request channel through a cloneable
//! [`SchedulerHandle`]. When an entry comes due and its [`CancelToken`] can
//! be claimed, the timer sends a [`Fired`] message to the dispatch channel;
//! a dispatch worker then re-enters the execution cycle with it.
//!
//! Cancellation is cooperative. Cancelling a token never touches the timer;
//! the timer skips cancelled entries when they come due and purges them
//! when asked for the pending count. A firing that races a cancel is
//! caught later, under the locks, when the cycle checks that the thing's
//! slot still holds the same token.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, trace};
use warren_core::{CancelToken, Dice, EventKind, Pending, ThingId};
use warren_world::Thing;

// ── Error types ──────────────────────────────────────────────────

/// Errors talking to the timer thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerError {
    /// The timer thread has stopped.
    Stopped,
    /// The timer thread could not be spawned.
    SpawnFailed {
        /// The OS error text.
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "scheduler has stopped"),
            Self::SpawnFailed { reason } => write!(f, "failed to spawn timer thread: {reason}"),
        }
    }
}

impl Error for SchedulerError {}

// ── Messages ─────────────────────────────────────────────────────

/// A due event whose token the timer claimed.
#[derive(Clone, Debug)]
pub struct Fired {
    /// The thing the event belongs to.
    pub thing: ThingId,
    /// What the event does.
    pub kind: EventKind,
    /// The claimed token, re-validated under the locks.
    pub token: CancelToken,
    /// When the event was due.
    pub due: Instant,
}

struct Entry {
    thing: ThingId,
    kind: EventKind,
    token: CancelToken,
    due: Instant,
}

enum Request {
    Schedule(Entry),
    Pending(Sender<usize>),
    Shutdown,
}

// ── Stats ────────────────────────────────────────────────────────

/// Scheduler counters, shared between the timer and every handle.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    scheduled: AtomicU64,
    fired: AtomicU64,
    cancelled: AtomicU64,
    superseded: AtomicU64,
}

impl SchedulerStats {
    /// Copy the counters.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            fired: self.fired.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    /// Events scheduled.
    pub scheduled: u64,
    /// Events whose token the timer claimed and dispatched.
    pub fired: u64,
    /// Entries dropped because their token was cancelled.
    pub cancelled: u64,
    /// Entries replaced by a newer event of the same kind for the same thing.
    pub superseded: u64,
}

// ── SchedulerHandle ──────────────────────────────────────────────

/// Cloneable handle for scheduling events and querying the timer.
#[derive(Clone)]
pub struct SchedulerHandle {
    requests: Sender<Request>,
    stats: Arc<SchedulerStats>,
}

impl SchedulerHandle {
    /// Queue a timer entry for an already issued token.
    pub fn queue(
        &self,
        thing: ThingId,
        kind: EventKind,
        token: CancelToken,
        due: Instant,
    ) -> Result<(), SchedulerError> {
        self.requests
            .send(Request::Schedule(Entry {
                thing,
                kind,
                token,
                due,
            }))
            .map_err(|_| SchedulerError::Stopped)
    }

    /// Schedule `kind` for `thing` after `after` plus a random jitter in
    /// `[0, jitter)`, replacing any pending event of the same kind.
    ///
    /// Returns the due time. On error nothing is installed on the thing.
    pub fn schedule(
        &self,
        thing: &mut Thing,
        kind: EventKind,
        after: Duration,
        jitter: Duration,
        dice: &dyn Dice,
    ) -> Result<Instant, SchedulerError> {
        let due = Instant::now() + after + dice.jitter(jitter);
        let token = CancelToken::issue();
        self.queue(thing.id(), kind, token.clone(), due)?;
        thing.events.install(kind, Pending { token, due });
        self.stats.scheduled.fetch_add(1, Ordering::Relaxed);
        trace!(thing = %thing.id(), %kind, ?after, "scheduled");
        Ok(due)
    }

    /// Number of live entries, after purging cancelled ones.
    pub fn pending(&self) -> Result<usize, SchedulerError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.requests
            .send(Request::Pending(reply_tx))
            .map_err(|_| SchedulerError::Stopped)?;
        reply_rx.recv().map_err(|_| SchedulerError::Stopped)
    }

    /// Current counters.
    pub fn stats(&self) -> SchedulerSnapshot {
        self.stats.snapshot()
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

// ── Timer ────────────────────────────────────────────────────────

/// State owned by the timer thread.
struct Timer {
    requests: Receiver<Request>,
    fired: Sender<Fired>,
    stats: Arc<SchedulerStats>,
    queue: BinaryHeap<Reverse<(Instant, u64)>>,
    entries: HashMap<u64, Entry>,
    latest: HashMap<(ThingId, EventKind), u64>,
    next_seq: u64,
}

impl Timer {
    /// Returns the number of entries still pending at shutdown.
    fn run(mut self) -> usize {
        debug!("timer started");
        loop {
            self.fire_due();
            let request = match self.next_due() {
                Some(due) => self
                    .requests
                    .recv_timeout(due.saturating_duration_since(Instant::now())),
                None => self
                    .requests
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match request {
                Ok(Request::Schedule(entry)) => self.insert(entry),
                Ok(Request::Pending(reply)) => {
                    self.purge();
                    let _ = reply.send(self.entries.len());
                }
                Ok(Request::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        self.purge();
        let dropped = self.entries.len();
        for entry in self.entries.values() {
            entry.token.cancel();
        }
        debug!(dropped, "timer stopped");
        dropped
    }

    fn next_due(&self) -> Option<Instant> {
        self.queue.peek().map(|Reverse((due, _))| *due)
    }

    fn insert(&mut self, entry: Entry) {
        let seq = self.next_seq;
        self.next_seq += 1;
        if let Some(previous) = self.latest.insert((entry.thing, entry.kind), seq) {
            if let Some(old) = self.entries.remove(&previous) {
                old.token.cancel();
                self.stats.superseded.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.queue.push(Reverse((entry.due, seq)));
        self.entries.insert(seq, entry);
    }

    fn fire_due(&mut self) {
        let now = Instant::now();
        while let Some(Reverse((due, seq))) = self.queue.peek().copied() {
            if due > now {
                break;
            }
            self.queue.pop();
            // Superseded and purged entries leave their key behind.
            let Some(entry) = self.entries.remove(&seq) else {
                continue;
            };
            let key = (entry.thing, entry.kind);
            if self.latest.get(&key) == Some(&seq) {
                self.latest.remove(&key);
            }
            if !entry.token.try_fire() {
                self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            self.stats.fired.fetch_add(1, Ordering::Relaxed);
            trace!(thing = %entry.thing, kind = %entry.kind, "fired");
            let fired = Fired {
                thing: entry.thing,
                kind: entry.kind,
                token: entry.token,
                due: entry.due,
            };
            if self.fired.send(fired).is_err() {
                debug!("dispatch channel closed, firing dropped");
            }
        }
    }

    fn purge(&mut self) {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.token.is_cancelled());
        let purged = before - self.entries.len();
        if purged > 0 {
            self.stats
                .cancelled
                .fetch_add(purged as u64, Ordering::Relaxed);
            let entries = &self.entries;
            self.latest.retain(|_, seq| entries.contains_key(seq));
        }
    }
}

// ── Scheduler ────────────────────────────────────────────────────

/// Outcome of stopping the timer thread.
#[derive(Debug)]
pub struct SchedulerShutdown {
    /// Whether the timer thread was joined successfully.
    pub joined: bool,
    /// Entries still pending when the timer stopped. Their tokens are
    /// cancelled.
    pub dropped: usize,
}

/// Owner of the timer thread.
pub struct Scheduler {
    handle: SchedulerHandle,
    thread: Option<JoinHandle<usize>>,
}

impl Scheduler {
    /// Spawn the timer thread. Claimed events are sent to `fired`; the
    /// sender is dropped when the timer stops, which closes the channel.
    pub fn start(fired: Sender<Fired>) -> Result<Self, SchedulerError> {
        let (requests_tx, requests_rx) = crossbeam_channel::unbounded();
        let stats = Arc::new(SchedulerStats::default());
        let timer = Timer {
            requests: requests_rx,
            fired,
            stats: Arc::clone(&stats),
            queue: BinaryHeap::new(),
            entries: HashMap::new(),
            latest: HashMap::new(),
            next_seq: 0,
        };
        let thread = thread::Builder::new()
            .name("warren-timer".into())
            .spawn(move || timer.run())
            .map_err(|e| SchedulerError::SpawnFailed {
                reason: e.to_string(),
            })?;
        Ok(Self {
            handle: SchedulerHandle {
                requests: requests_tx,
                stats,
            },
            thread: Some(thread),
        })
    }

    /// A handle for scheduling and queries.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Stop the timer thread and wait for it. Idempotent.
    pub fn shutdown(&mut self) -> SchedulerShutdown {
        let Some(thread) = self.thread.take() else {
            return SchedulerShutdown {
                joined: true,
                dropped: 0,
            };
        };
        let _ = self.handle.requests.send(Request::Shutdown);
        match thread.join() {
            Ok(dropped) => {
                info!(dropped, "scheduler stopped");
                SchedulerShutdown {
                    joined: true,
                    dropped,
                }
            }
            Err(_) => SchedulerShutdown {
                joined: false,
                dropped: 0,
            },
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_test_utils::LoadedDice;

    fn started() -> (Scheduler, Receiver<Fired>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Scheduler::start(tx).unwrap(), rx)
    }

    #[test]
    fn due_time_includes_jitter() {
        let (scheduler, _rx) = started();
        let handle = scheduler.handle();
        let mut thing = Thing::new("a parrot");
        // below(4s in nanos) with a large roll: jitter just under the cap.
        let dice = LoadedDice::always(u64::MAX);
        let before = Instant::now();
        let due = handle
            .schedule(
                &mut thing,
                EventKind::Action,
                Duration::from_secs(8),
                Duration::from_secs(4),
                &dice,
            )
            .unwrap();
        let after = Instant::now();
        assert!(due >= before + Duration::from_secs(8));
        assert!(due < after + Duration::from_secs(12));
        let pending = thing.events.pending(EventKind::Action).unwrap();
        assert_eq!(pending.due, due);
    }

    #[test]
    fn fires_in_due_order() {
        let (scheduler, rx) = started();
        let handle = scheduler.handle();
        let dice = LoadedDice::always(0);
        let mut slow = Thing::new("slow");
        let mut fast = Thing::new("fast");
        handle
            .schedule(&mut slow, EventKind::Action, Duration::from_millis(60), Duration::ZERO, &dice)
            .unwrap();
        handle
            .schedule(&mut fast, EventKind::Action, Duration::from_millis(10), Duration::ZERO, &dice)
            .unwrap();
        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first.thing, fast.id());
        assert_eq!(second.thing, slow.id());
        assert!(first.token.is_fired());
    }

    #[test]
    fn rescheduling_fires_once() {
        let (scheduler, rx) = started();
        let handle = scheduler.handle();
        let dice = LoadedDice::always(0);
        let mut thing = Thing::new("a goblin");
        handle
            .schedule(&mut thing, EventKind::Combat, Duration::from_millis(10), Duration::ZERO, &dice)
            .unwrap();
        let first = thing.events.pending(EventKind::Combat).unwrap().token.clone();
        handle
            .schedule(&mut thing, EventKind::Combat, Duration::from_millis(20), Duration::ZERO, &dice)
            .unwrap();
        assert!(first.is_cancelled());

        let fired = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(thing.events.is_current(EventKind::Combat, &fired.token));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(handle.stats().superseded, 1);
        assert_eq!(handle.stats().fired, 1);
    }

    #[test]
    fn cancelled_event_never_fires() {
        let (scheduler, rx) = started();
        let handle = scheduler.handle();
        let dice = LoadedDice::always(0);
        let mut thing = Thing::new("a corpse");
        handle
            .schedule(&mut thing, EventKind::Cleanup, Duration::from_millis(20), Duration::ZERO, &dice)
            .unwrap();
        let token = thing.events.pending(EventKind::Cleanup).unwrap().token.clone();
        assert!(thing.events.cancel(EventKind::Cleanup));
        assert!(!token.cancel());
        assert_eq!(handle.pending().unwrap(), 0);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn pending_counts_live_entries() {
        let (scheduler, _rx) = started();
        let handle = scheduler.handle();
        let dice = LoadedDice::always(0);
        let mut things: Vec<Thing> = (0..3).map(|i| Thing::new(format!("mob {i}"))).collect();
        for t in &mut things {
            handle
                .schedule(t, EventKind::Health, Duration::from_secs(60), Duration::ZERO, &dice)
                .unwrap();
        }
        assert_eq!(handle.pending().unwrap(), 3);
        things[1].events.cancel_all();
        assert_eq!(handle.pending().unwrap(), 2);
    }

    #[test]
    fn shutdown_cancels_leftovers_and_closes_dispatch() {
        let (mut scheduler, rx) = started();
        let handle = scheduler.handle();
        let dice = LoadedDice::always(0);
        let mut thing = Thing::new("a goblin");
        handle
            .schedule(&mut thing, EventKind::Action, Duration::from_secs(60), Duration::ZERO, &dice)
            .unwrap();
        let report = scheduler.shutdown();
        assert!(report.joined);
        assert_eq!(report.dropped, 1);
        assert!(thing.events.pending(EventKind::Action).unwrap().token.is_cancelled());
        assert!(rx.recv().is_err());
        assert_eq!(handle.pending(), Err(SchedulerError::Stopped));
        assert!(scheduler.shutdown().joined);
    }
}
