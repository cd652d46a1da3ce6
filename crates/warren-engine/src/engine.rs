//! The engine: shared execution context, the timer, and the dispatch pool.
//!
//! [`Context::execute`] is the single entry point for both typed commands
//! and fired events. It runs one invocation of the execution cycle on the
//! calling thread, then delivers the buffered text once every lock has
//! been released.
//!
//! [`Engine`] owns the threads: one timer thread (see
//! [`scheduler`](crate::scheduler)) and a pool of dispatch workers that
//! execute fired events through the same [`Context`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use tracing::{debug, info, trace, warn};
use warren_core::{CancelToken, Dice, EventKind, ExecuteError, Lockable, ThingId, WorldError};
use warren_world::{Location, Thing, World};

use crate::commands::{self, Handler, Handlers};
use crate::config::{ConfigError, EngineConfig};
use crate::cycle::{self, Cycle, Held};
use crate::dice::SeededDice;
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::resource::ResourceSet;
use crate::scheduler::{Fired, Scheduler, SchedulerError, SchedulerHandle, SchedulerSnapshot};
use crate::state::{CommandState, Halt, Outbox};

// ── Input / Outcome ──────────────────────────────────────────────

/// What an invocation executes.
#[derive(Clone, Debug)]
pub enum Input {
    /// A line typed by an actor.
    Text(String),
    /// A fired event. The verb is the event's name.
    Scheduled {
        /// The event kind.
        kind: EventKind,
        /// The token the timer claimed.
        token: CancelToken,
    },
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// How an invocation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The handler ran to completion.
    Completed,
    /// Nothing matched. The actor was told.
    NoMatch,
    /// The command was not allowed. The actor was told.
    Vetoed,
    /// The actor is no longer in the world, or the event no longer applies.
    Stale,
}

/// Result of a successful [`Context::execute`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Executed {
    /// How the invocation ended.
    pub outcome: Outcome,
    /// Passes made by the execution cycle.
    pub passes: u32,
}

// ── Context ──────────────────────────────────────────────────────

/// Everything an invocation needs, shared by all executing threads.
pub struct Context {
    /// The world graph.
    pub world: Arc<World>,
    /// Validated configuration.
    pub config: EngineConfig,
    /// Source of every random decision.
    pub dice: Arc<dyn Dice>,
    /// Handle to the timer thread.
    pub scheduler: SchedulerHandle,
    /// Verb table.
    pub handlers: Handlers,
    /// Execution counters.
    pub metrics: EngineMetrics,
    stopping: AtomicBool,
}

// Compile-time assertion: Context is shared across dispatch workers.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Context>();
};

impl Context {
    /// Execute one command or fired event for `actor`.
    ///
    /// # Errors
    ///
    /// [`ExecuteError::HandlerPanicked`] if the handler panicked; every
    /// lock taken was released while unwinding and nothing was delivered.
    /// [`ExecuteError::ShuttingDown`] once the engine is stopping.
    pub fn execute(&self, actor: ThingId, input: impl Into<Input>) -> Result<Executed, ExecuteError> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(ExecuteError::ShuttingDown);
        }

        let origin = self.world.whereabouts(actor);
        let state = match input.into() {
            Input::Text(text) => CommandState::parse(actor, origin, &text),
            Input::Scheduled { kind, token } => CommandState::scheduled(actor, origin, kind, token),
        };
        let scheduled = state.scheduled.is_some();
        let verb = state.cmd.clone();
        // Internal event verbs cannot be typed.
        let handler = if !scheduled && verb.starts_with('$') {
            commands::unknown
        } else {
            self.handlers.get(&verb).unwrap_or(commands::unknown)
        };

        let mut invocation = Invocation {
            ctx: self,
            state,
            handler,
            outcome: Outcome::Stale,
            asked_relock: false,
            outbox: Outbox::new(),
        };

        let passes = match panic::catch_unwind(AssertUnwindSafe(|| cycle::run(&mut invocation))) {
            Ok(passes) => passes,
            Err(_) => {
                self.metrics.record_panic();
                warn!(%actor, verb = %verb, "handler panicked, locks released");
                return Err(ExecuteError::HandlerPanicked { verb, actor });
            }
        };

        for (sink, text) in invocation.outbox.drain(..) {
            sink.deliver(&text);
        }

        let outcome = invocation.outcome;
        self.metrics.record_execution(passes);
        if scheduled {
            self.metrics.record_event(outcome == Outcome::Stale);
        }
        if outcome == Outcome::Stale {
            debug!(%actor, verb = %verb, "stale invocation");
        }
        Ok(Executed { outcome, passes })
    }

    /// Place `thing` in `at` and start its events: ambient action,
    /// clean-up and (if hurt) health regeneration.
    pub fn spawn(&self, mut thing: Thing, at: &Arc<Location>) -> Result<ThingId, WorldError> {
        let id = thing.id();
        if self.world.whereabouts(id).is_some() {
            return Err(WorldError::AlreadyPlaced { id });
        }
        let mut contents = at.lock();
        // Whereabouts first: an event firing at once must find the thing.
        self.world.record(id, at);
        self.arm(&mut thing);
        contents.admit(thing);
        debug!(thing = %id, location = at.name(), "spawned");
        Ok(id)
    }

    /// Start the events a newly placed thing should have.
    pub fn arm(&self, thing: &mut Thing) {
        self.schedule_action(thing);
        self.schedule_cleanup(thing);
        self.schedule_health(thing);
    }

    /// Schedule an event, logging instead of failing if the timer is gone.
    pub fn schedule(
        &self,
        thing: &mut Thing,
        kind: EventKind,
        after: Duration,
        jitter: Duration,
    ) -> Option<Instant> {
        match self
            .scheduler
            .schedule(thing, kind, after, jitter, self.dice.as_ref())
        {
            Ok(due) => Some(due),
            Err(e) => {
                debug!(thing = %thing.id(), %kind, error = %e, "event not scheduled");
                None
            }
        }
    }

    /// Schedule the next ambient action, if the thing has one.
    pub fn schedule_action(&self, thing: &mut Thing) -> Option<Instant> {
        let (after, jitter) = thing
            .action
            .as_ref()
            .filter(|spec| !spec.texts.is_empty())
            .map(|spec| (spec.after, spec.jitter))?;
        self.schedule(thing, EventKind::Action, after, jitter)
    }

    /// Schedule the clean-up, if the thing has one.
    pub fn schedule_cleanup(&self, thing: &mut Thing) -> Option<Instant> {
        let after = thing.cleanup.as_ref().map(|spec| spec.after)?;
        self.schedule(thing, EventKind::Cleanup, after, Duration::ZERO)
    }

    /// Schedule a regeneration tick if the thing is hurt and none is
    /// pending.
    pub fn schedule_health(&self, thing: &mut Thing) -> Option<Instant> {
        let after = thing
            .health
            .as_ref()
            .filter(|h| !h.is_full() && h.regen_amount > 0)
            .map(|h| h.regen_after)?;
        if thing.events.is_pending(EventKind::Health) {
            return None;
        }
        self.schedule(thing, EventKind::Health, after, Duration::ZERO)
    }

    /// Roll damage within the configured range.
    pub fn roll_damage(&self) -> i64 {
        self.dice
            .range(self.config.damage_min, self.config.damage_max)
    }
}

// ── Invocation ───────────────────────────────────────────────────

/// One run of the cycle for one actor.
struct Invocation<'c> {
    ctx: &'c Context,
    state: CommandState,
    handler: Handler,
    outcome: Outcome,
    asked_relock: bool,
    outbox: Outbox,
}

/// Where the actor was found at the start of a pass.
enum Located {
    Here,
    Relock,
    Gone,
}

impl Invocation<'_> {
    /// Confirm the actor is in `origin`, following it if it moved.
    fn locate(&mut self, held: &Held<'_, Location>) -> Located {
        let actor = self.state.actor;
        if let Some(origin) = &self.state.origin {
            if held.get(origin).is_some_and(|c| c.contains(actor)) {
                return Located::Here;
            }
        }

        let Some(now) = self.ctx.world.whereabouts(actor) else {
            return Located::Gone;
        };
        if held.get(&now).is_some_and(|c| c.contains(actor)) {
            self.state.origin = Some(now);
            return Located::Here;
        }
        if self.state.add_lock(&now) {
            trace!(%actor, location = now.name(), "actor moved, following");
            self.state.origin = Some(now);
            return Located::Relock;
        }
        warn!(%actor, location = now.name(), "whereabouts disagree with a held location");
        Located::Gone
    }

    /// Empty the event slot on the settling pass, wherever the actor is now.
    fn clear_fired_slot(&self, held: &mut Held<'_, Location>) {
        let Some((kind, token)) = &self.state.scheduled else {
            return;
        };
        let handles: Vec<Arc<Location>> = held.handles().cloned().collect();
        for handle in &handles {
            if let Some(thing) = held
                .get_mut(handle)
                .and_then(|c| c.thing_mut(self.state.actor))
            {
                thing.events.clear_if_current(*kind, token);
                return;
            }
        }
    }
}

impl Cycle<Location> for Invocation<'_> {
    fn resources(&self) -> &ResourceSet<Location> {
        &self.state.resources
    }

    fn pass(&mut self, held: &mut Held<'_, Location>) {
        self.state.begin_pass();
        self.asked_relock = false;
        self.outcome = Outcome::Stale;

        match self.locate(held) {
            Located::Here => {}
            Located::Relock => return,
            Located::Gone => return,
        }

        let actor = self.state.actor;
        let Some(thing) = self.state.contents(held).ok().and_then(|c| c.thing(actor)) else {
            return;
        };
        if let Some((kind, token)) = &self.state.scheduled {
            if !thing.events.is_current(*kind, token) {
                return;
            }
        }
        self.state.remember_actor(thing);

        self.outcome = match (self.handler)(&mut self.state, held, self.ctx) {
            Ok(()) => {
                self.state.ok = true;
                Outcome::Completed
            }
            Err(Halt::Relock) => {
                self.asked_relock = true;
                Outcome::Completed
            }
            Err(Halt::NoMatch(text)) => {
                self.state.halt_with(Some(text));
                Outcome::NoMatch
            }
            Err(Halt::Veto(text)) => {
                self.state.halt_with(Some(text));
                Outcome::Vetoed
            }
            Err(Halt::Stale) => {
                self.state.halt_with(None);
                Outcome::Stale
            }
        };
    }

    fn settle(&mut self, held: &mut Held<'_, Location>) {
        if self.asked_relock {
            warn!(cmd = %self.state.cmd, "relock requested without a new lock");
        }
        if self.outcome != Outcome::Stale {
            self.clear_fired_slot(held);
        }
        self.outbox = self.state.resolve(held);
    }
}

// ── ShutdownReport ───────────────────────────────────────────────

/// Report from [`Engine::shutdown`].
#[derive(Debug)]
pub struct ShutdownReport {
    /// Total time spent shutting down.
    pub total_ms: u64,
    /// Whether the timer thread was joined successfully.
    pub timer_joined: bool,
    /// Number of dispatch workers joined.
    pub workers_joined: usize,
    /// Events still pending when the timer stopped.
    pub entries_dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownState {
    Running,
    Stopped,
}

// ── Engine ───────────────────────────────────────────────────────

/// Builder for [`Engine`], for overriding the dice or the verb table.
pub struct EngineBuilder {
    world: World,
    config: EngineConfig,
    dice: Option<Arc<dyn Dice>>,
    handlers: Option<Handlers>,
}

impl EngineBuilder {
    /// Use this configuration instead of the default.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use these dice instead of seeding from the configuration.
    pub fn dice(mut self, dice: impl Dice + 'static) -> Self {
        self.dice = Some(Arc::new(dice));
        self
    }

    /// Use this verb table instead of [`Handlers::standard`].
    pub fn handlers(mut self, handlers: Handlers) -> Self {
        self.handlers = Some(handlers);
        self
    }

    /// Validate the configuration and start the timer and dispatch threads.
    pub fn build(self) -> Result<Engine, ConfigError> {
        self.config.validate()?;
        let worker_count = self.config.resolved_worker_count();
        let dice = self
            .dice
            .unwrap_or_else(|| Arc::new(SeededDice::from_seed(self.config.seed)));

        let (fired_tx, fired_rx) = crossbeam_channel::unbounded();
        let scheduler = Scheduler::start(fired_tx)?;

        let ctx = Arc::new(Context {
            world: Arc::new(self.world),
            config: self.config,
            dice,
            scheduler: scheduler.handle(),
            handlers: self.handlers.unwrap_or_else(Handlers::standard),
            metrics: EngineMetrics::default(),
            stopping: AtomicBool::new(false),
        });

        let mut engine = Engine {
            ctx,
            scheduler,
            workers: Vec::with_capacity(worker_count),
            state: ShutdownState::Running,
        };
        for i in 0..worker_count {
            let ctx = Arc::clone(&engine.ctx);
            let rx = fired_rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("warren-dispatch-{i}"))
                .spawn(move || dispatch_loop(&ctx, &rx));
            match spawned {
                Ok(handle) => engine.workers.push(handle),
                Err(e) => {
                    // Dropping the engine stops the threads already running.
                    return Err(ConfigError::ThreadSpawnFailed {
                        reason: format!("dispatch worker {i}: {e}"),
                    });
                }
            }
        }
        info!(workers = worker_count, locations = engine.ctx.world.locations().len(), "engine started");
        Ok(engine)
    }
}

/// A running world: shared context, timer thread and dispatch pool.
pub struct Engine {
    ctx: Arc<Context>,
    scheduler: Scheduler,
    workers: Vec<JoinHandle<()>>,
    state: ShutdownState,
}

impl Engine {
    /// Start an engine over `world` with `config`.
    pub fn new(world: World, config: EngineConfig) -> Result<Self, ConfigError> {
        Self::builder(world).config(config).build()
    }

    /// Start configuring an engine over `world`.
    pub fn builder(world: World) -> EngineBuilder {
        EngineBuilder {
            world,
            config: EngineConfig::default(),
            dice: None,
            handlers: None,
        }
    }

    /// The shared context, for threads that execute commands.
    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    /// The world graph.
    pub fn world(&self) -> &Arc<World> {
        &self.ctx.world
    }

    /// Execute a command for `actor` on the calling thread.
    pub fn execute(&self, actor: ThingId, input: impl Into<Input>) -> Result<Executed, ExecuteError> {
        self.ctx.execute(actor, input)
    }

    /// Place a thing in the world and start its events.
    pub fn spawn(&self, thing: Thing, at: &Arc<Location>) -> Result<ThingId, WorldError> {
        self.ctx.spawn(thing, at)
    }

    /// Execution counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// Scheduler counters.
    pub fn scheduler_stats(&self) -> SchedulerSnapshot {
        self.ctx.scheduler.stats()
    }

    /// Live timer entries, after purging cancelled ones.
    pub fn pending_events(&self) -> Result<usize, SchedulerError> {
        self.ctx.scheduler.pending()
    }

    /// Stop accepting commands, stop the timer and join the dispatch pool.
    /// Idempotent.
    pub fn shutdown(&mut self) -> ShutdownReport {
        if self.state == ShutdownState::Stopped {
            return ShutdownReport {
                total_ms: 0,
                timer_joined: true,
                workers_joined: 0,
                entries_dropped: 0,
            };
        }
        let start = Instant::now();
        self.state = ShutdownState::Stopped;
        self.ctx.stopping.store(true, Ordering::Release);

        // The timer owns the dispatch sender: once it exits the workers
        // see a closed channel.
        let timer = self.scheduler.shutdown();

        let mut workers_joined = 0;
        for handle in self.workers.drain(..) {
            if handle.join().is_ok() {
                workers_joined += 1;
            }
        }

        let total_ms = start.elapsed().as_millis() as u64;
        info!(total_ms, workers_joined, dropped = timer.dropped, "engine stopped");
        ShutdownReport {
            total_ms,
            timer_joined: timer.joined,
            workers_joined,
            entries_dropped: timer.dropped,
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.state != ShutdownState::Stopped {
            self.shutdown();
        }
    }
}

fn dispatch_loop(ctx: &Context, fired: &Receiver<Fired>) {
    for event in fired.iter() {
        trace!(
            thing = %event.thing,
            kind = %event.kind,
            late_us = event.due.elapsed().as_micros() as u64,
            "dispatching"
        );
        let input = Input::Scheduled {
            kind: event.kind,
            token: event.token,
        };
        match ctx.execute(event.thing, input) {
            Ok(_) => {}
            Err(ExecuteError::ShuttingDown) => break,
            Err(e) => warn!(thing = %event.thing, error = %e, "scheduled event failed"),
        }
    }
}
