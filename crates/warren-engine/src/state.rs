//! Per-invocation command state and message buffers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::warn;
use warren_core::{CancelToken, EventKind, LockId, Lockable, Sink, ThingId};
use warren_world::{Contents, Location, Thing};

use crate::cycle::Held;
use crate::resource::ResourceSet;

// ── Halt ─────────────────────────────────────────────────────────

/// Why a handler stopped before completing.
///
/// None of these are failures of the invocation: the cycle releases its
/// locks and finishes normally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Halt {
    /// The command did not match anything. The text goes to the actor.
    NoMatch(String),
    /// The command matched but is not allowed. The text goes to the actor.
    Veto(String),
    /// A scheduled event no longer applies. Nobody is told.
    Stale,
    /// The handler added locks and wants the pass repeated.
    Relock,
}

/// What every handler returns.
pub type Handled = Result<(), Halt>;

// ── Buffer ───────────────────────────────────────────────────────

/// Lines of text for one audience.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Buffer {
    lines: Vec<String>,
}

impl Buffer {
    /// Start a new line.
    pub fn send(&mut self, text: impl Into<String>) {
        self.lines.push(text.into());
    }

    /// Continue the last line, or start one if the buffer is empty.
    pub fn append(&mut self, text: &str) {
        match self.lines.last_mut() {
            Some(last) => last.push_str(text),
            None => self.lines.push(text.to_owned()),
        }
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The lines written so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// All lines joined for delivery.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    fn clear(&mut self) {
        self.lines.clear();
    }
}

// ── Messages ─────────────────────────────────────────────────────

/// Message buffers for every audience of one invocation.
///
/// Observer buffers are keyed by location and reach everyone standing there
/// except the actor, the participant and anyone addressed individually.
#[derive(Default)]
pub struct Messages {
    /// Text for the actor.
    pub actor: Buffer,
    /// Text for the participant (the thing acted upon).
    pub participant: Buffer,
    others: IndexMap<ThingId, Buffer>,
    observers: IndexMap<LockId, Buffer>,
    sinks: HashMap<ThingId, Arc<dyn Sink>>,
}

impl Messages {
    /// The buffer for a specific thing. Remembers where to deliver it.
    pub fn to(&mut self, thing: &Thing) -> &mut Buffer {
        if let Some(sink) = thing.sink() {
            self.sinks.insert(thing.id(), Arc::clone(sink));
        }
        self.others.entry(thing.id()).or_default()
    }

    /// The observer buffer for a location.
    pub fn observers(&mut self, at: &Location) -> &mut Buffer {
        self.observers.entry(at.lock_id()).or_default()
    }

    /// Remember a sink for the actor or participant.
    pub(crate) fn remember(&mut self, thing: &Thing) {
        if let Some(sink) = thing.sink() {
            self.sinks.insert(thing.id(), Arc::clone(sink));
        }
    }

    /// Whether any buffer has text in it.
    pub fn is_empty(&self) -> bool {
        self.actor.is_empty()
            && self.participant.is_empty()
            && self.others.values().all(Buffer::is_empty)
            && self.observers.values().all(Buffer::is_empty)
    }

    /// Observer text buffered for a location, if any.
    pub fn observed_at(&self, id: LockId) -> Option<&Buffer> {
        self.observers.get(&id)
    }

    fn reset(&mut self) {
        self.actor.clear();
        self.participant.clear();
        self.others.clear();
        self.observers.clear();
    }
}

impl fmt::Debug for Messages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messages")
            .field("actor", &self.actor)
            .field("participant", &self.participant)
            .field("others", &self.others)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}

/// Text resolved to its recipients, ready to send once locks are released.
pub(crate) type Outbox = Vec<(Arc<dyn Sink>, String)>;

// ── Scratch ──────────────────────────────────────────────────────

/// Decisions that must survive a relock.
///
/// A pass that asks for more locks is repeated from the top. Random rolls
/// are made once and stashed here so the repeated pass sees the same
/// outcome as the first.
#[derive(Debug, Default)]
pub struct Scratch {
    /// Damage rolled for this invocation.
    pub damage: Option<i64>,
    /// Coin flipped for who strikes in a combat round.
    pub actor_strikes: Option<bool>,
    /// Start location picked for a respawn.
    pub respawn_at: Option<Arc<Location>>,
    /// Index of the ambient text picked.
    pub text: Option<usize>,
}

// ── CommandState ─────────────────────────────────────────────────

/// Everything one command invocation knows and owns.
pub struct CommandState {
    /// The thing executing the command.
    pub actor: ThingId,
    /// The container the actor is in for the current pass.
    pub origin: Option<Arc<Location>>,
    /// Input words after the verb, case preserved.
    pub input: Vec<String>,
    /// The verb, uppercased.
    pub cmd: String,
    /// Words after the verb, uppercased.
    pub words: Vec<String>,
    /// Set when the invocation was fired by the scheduler.
    pub scheduled: Option<(EventKind, CancelToken)>,
    /// Whether the handler completed.
    pub ok: bool,
    /// The thing acted upon, if any.
    pub participant: Option<ThingId>,
    /// Locks the next pass must hold.
    pub resources: ResourceSet<Location>,
    /// Message buffers, reset at the start of every pass.
    pub msg: Messages,
    /// Decisions carried across passes.
    pub scratch: Scratch,
}

impl CommandState {
    /// State for a typed command. The first word is the verb.
    pub fn parse(actor: ThingId, origin: Option<Arc<Location>>, text: &str) -> Self {
        let mut input: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
        let mut words: Vec<String> = input.iter().map(|w| w.to_uppercase()).collect();
        let cmd = if words.is_empty() {
            String::new()
        } else {
            input.remove(0);
            words.remove(0)
        };
        Self::new(actor, origin, cmd, input, words, None)
    }

    /// State for a scheduled event. The verb is the event's name.
    pub fn scheduled(
        actor: ThingId,
        origin: Option<Arc<Location>>,
        kind: EventKind,
        token: CancelToken,
    ) -> Self {
        Self::new(
            actor,
            origin,
            kind.verb().to_owned(),
            Vec::new(),
            Vec::new(),
            Some((kind, token)),
        )
    }

    fn new(
        actor: ThingId,
        origin: Option<Arc<Location>>,
        cmd: String,
        input: Vec<String>,
        words: Vec<String>,
        scheduled: Option<(EventKind, CancelToken)>,
    ) -> Self {
        let resources = ResourceSet::seeded(origin.as_ref());
        Self {
            actor,
            origin,
            input,
            cmd,
            words,
            scheduled,
            ok: false,
            participant: None,
            resources,
            msg: Messages::default(),
            scratch: Scratch::default(),
        }
    }

    /// Clear everything a pass produces. Scratch is kept.
    pub(crate) fn begin_pass(&mut self) {
        self.ok = false;
        self.participant = None;
        self.msg.reset();
    }

    /// Drop partial output after a halt, keeping only `text` for the actor.
    pub(crate) fn halt_with(&mut self, text: Option<String>) {
        self.msg.reset();
        if let Some(text) = text {
            self.msg.actor.send(text);
        }
    }

    /// Add a lock; true if the set grew.
    pub fn add_lock(&mut self, at: &Arc<Location>) -> bool {
        self.resources.add_lock(at)
    }

    /// The actor's container for this pass.
    pub fn here(&self) -> Result<Arc<Location>, Halt> {
        self.origin.clone().ok_or(Halt::Stale)
    }

    /// Contents of the actor's container.
    pub fn contents<'h>(
        &self,
        held: &'h mut Held<'_, Location>,
    ) -> Result<&'h mut Contents, Halt> {
        let here = self.origin.as_ref().ok_or(Halt::Stale)?;
        held.get_mut(here).ok_or(Halt::Stale)
    }

    /// Mark `thing` as the participant and remember its sink.
    pub fn set_participant(&mut self, thing: &Thing) {
        self.participant = Some(thing.id());
        self.msg.remember(thing);
    }

    /// Remember the actor's sink for delivery.
    pub(crate) fn remember_actor(&mut self, thing: &Thing) {
        self.msg.remember(thing);
    }

    /// Resolve every buffer to its recipients while the locks are held.
    pub(crate) fn resolve(&self, held: &Held<'_, Location>) -> Outbox {
        let mut outbox = Outbox::new();
        let sink_of = |id: ThingId| self.msg.sinks.get(&id).cloned();

        if !self.msg.actor.is_empty() {
            if let Some(sink) = sink_of(self.actor) {
                outbox.push((sink, self.msg.actor.text()));
            }
        }
        if let Some(participant) = self.participant {
            if participant != self.actor && !self.msg.participant.is_empty() {
                if let Some(sink) = sink_of(participant) {
                    outbox.push((sink, self.msg.participant.text()));
                }
            }
        }
        for (id, buffer) in &self.msg.others {
            if buffer.is_empty() {
                continue;
            }
            if let Some(sink) = sink_of(*id) {
                outbox.push((sink, buffer.text()));
            }
        }

        for (lock_id, buffer) in &self.msg.observers {
            if buffer.is_empty() {
                continue;
            }
            let Some((_, contents)) = held.by_id(*lock_id) else {
                warn!(
                    lock = %lock_id,
                    cmd = %self.cmd,
                    "observer text for a location that is not held, dropped"
                );
                continue;
            };
            let text = buffer.text();
            for who in contents.who.values() {
                let id = who.id();
                if id == self.actor
                    || Some(id) == self.participant
                    || self.msg.others.contains_key(&id)
                {
                    continue;
                }
                if let Some(sink) = who.sink() {
                    outbox.push((Arc::clone(sink), text.clone()));
                }
            }
        }
        outbox
    }
}

impl fmt::Debug for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandState")
            .field("actor", &self.actor)
            .field("cmd", &self.cmd)
            .field("words", &self.words)
            .field("scheduled", &self.scheduled.as_ref().map(|(k, _)| *k))
            .field("ok", &self.ok)
            .field("participant", &self.participant)
            .field("resources", &self.resources)
            .finish_non_exhaustive()
    }
}
