//! Locations: lockable containers holding actors, items and exits.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use indexmap::IndexMap;
use warren_core::{Direction, LockId, Lockable, ThingId};

use crate::thing::Thing;

/// Everything a location's lock protects.
///
/// Insertion order is preserved so listings and observer delivery are
/// deterministic.
#[derive(Default)]
pub struct Contents {
    /// Actors present.
    pub who: IndexMap<ThingId, Thing>,
    /// Items present.
    pub items: IndexMap<ThingId, Thing>,
    exits: IndexMap<Direction, Weak<Location>>,
}

impl Contents {
    /// First thing answering to `word`, searching actors before items.
    pub fn find(&self, word: &str) -> Option<ThingId> {
        self.who
            .values()
            .chain(self.items.values())
            .find(|t| t.matches(word))
            .map(Thing::id)
    }

    /// Look a thing up among actors and items.
    pub fn thing(&self, id: ThingId) -> Option<&Thing> {
        self.who.get(&id).or_else(|| self.items.get(&id))
    }

    /// Mutable lookup among actors and items.
    pub fn thing_mut(&mut self, id: ThingId) -> Option<&mut Thing> {
        match self.who.get_mut(&id) {
            Some(thing) => Some(thing),
            None => self.items.get_mut(&id),
        }
    }

    /// Whether the thing is here.
    pub fn contains(&self, id: ThingId) -> bool {
        self.who.contains_key(&id) || self.items.contains_key(&id)
    }

    /// Remove a thing, keeping the order of the rest.
    pub fn take(&mut self, id: ThingId) -> Option<Thing> {
        self.who
            .shift_remove(&id)
            .or_else(|| self.items.shift_remove(&id))
    }

    /// Put a thing here: actors join `who`, everything else `items`.
    pub fn admit(&mut self, thing: Thing) {
        if thing.is_actor() {
            self.who.insert(thing.id(), thing);
        } else {
            self.items.insert(thing.id(), thing);
        }
    }

    /// Number of actors present.
    pub fn population(&self) -> usize {
        self.who.len()
    }

    /// The location an exit leads to, if it exists and is still alive.
    pub fn exit(&self, dir: Direction) -> Option<Arc<Location>> {
        self.exits.get(&dir).and_then(Weak::upgrade)
    }

    /// Directions with a live exit.
    pub fn exit_directions(&self) -> Vec<Direction> {
        self.exits
            .iter()
            .filter(|(_, to)| to.strong_count() > 0)
            .map(|(dir, _)| *dir)
            .collect()
    }

    /// Distinct locations reachable through one exit.
    pub fn neighbours(&self) -> Vec<Arc<Location>> {
        let mut out: Vec<Arc<Location>> = Vec::with_capacity(self.exits.len());
        for to in self.exits.values().filter_map(Weak::upgrade) {
            if !out.iter().any(|seen| Arc::ptr_eq(seen, &to)) {
                out.push(to);
            }
        }
        out
    }

    /// Add or replace an exit.
    pub fn link(&mut self, dir: Direction, to: &Arc<Location>) {
        self.exits.insert(dir, Arc::downgrade(to));
    }
}

/// A container in the world graph.
///
/// The name and combat veto are fixed when the world is built; everything
/// that changes lives in the lock-protected [`Contents`].
pub struct Location {
    lock_id: LockId,
    name: String,
    veto_combat: Option<String>,
    contents: Mutex<Contents>,
}

impl Location {
    /// An empty location with a fresh lock id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            lock_id: LockId::next(),
            name: name.into(),
            veto_combat: None,
            contents: Mutex::new(Contents::default()),
        }
    }

    /// Forbid fighting here, giving `message` to anyone who tries.
    pub fn with_veto_combat(mut self, message: impl Into<String>) -> Self {
        self.veto_combat = Some(message.into());
        self
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Message vetoing combat here, if combat is forbidden.
    pub fn veto_combat(&self) -> Option<&str> {
        self.veto_combat.as_deref()
    }
}

impl Lockable for Location {
    type Data = Contents;
    type Guard<'a> = MutexGuard<'a, Contents>;

    fn lock_id(&self) -> LockId {
        self.lock_id
    }

    fn lock(&self) -> MutexGuard<'_, Contents> {
        // A handler that panicked while holding this lock leaves the
        // contents as they were at the panic; later commands carry on.
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Location")
            .field("lock_id", &self.lock_id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
