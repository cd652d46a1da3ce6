//! Command handlers and the verb table.
//!
//! A handler is effect logic for one pass of the execution cycle. It must
//! finish every check that can halt it, and add every lock it needs, before
//! its first mutation: a pass that grows the resource set is thrown away
//! and repeated from the top.

mod ambient;
mod combat;
mod hit;
mod look;
mod movement;
mod quit;

use std::fmt;

use indexmap::IndexMap;
use warren_core::{EventKind, ThingId};
use warren_world::{Contents, Location, Thing};

use crate::cycle::Held;
use crate::engine::Context;
use crate::state::{Buffer, CommandState, Halt, Handled};

pub use ambient::{action, cleanup, health};
pub use combat::{combat_round, fight, stop};
pub use hit::hit;
pub use look::look;
pub use movement::go;
pub use quit::quit;

/// Effect logic for one verb.
pub type Handler = fn(&mut CommandState, &mut Held<'_, Location>, &Context) -> Handled;

/// Every word [`go`] answers to.
const MOVES: [&str; 20] = [
    "N", "NORTH", "NE", "NORTHEAST", "E", "EAST", "SE", "SOUTHEAST", "S", "SOUTH", "SW",
    "SOUTHWEST", "W", "WEST", "NW", "NORTHWEST", "U", "UP", "D", "DOWN",
];

/// Verb table. Verbs are uppercase; internal event verbs start with `$`.
#[derive(Clone)]
pub struct Handlers {
    table: IndexMap<&'static str, Handler>,
}

impl Handlers {
    /// A table with no verbs at all.
    pub fn empty() -> Self {
        Self {
            table: IndexMap::new(),
        }
    }

    /// The built-in commands and event handlers.
    pub fn standard() -> Self {
        let mut h = Self::empty();
        h.register(EventKind::Action.verb(), action);
        h.register(EventKind::Combat.verb(), combat_round);
        h.register(EventKind::Health.verb(), health);
        h.register(EventKind::Cleanup.verb(), cleanup);
        h.register("HIT", hit);
        h.register("FIGHT", fight);
        h.register("STOP", stop);
        h.register("LOOK", look);
        h.register("L", look);
        h.register("QUIT", quit);
        for verb in MOVES {
            h.register(verb, go);
        }
        h
    }

    /// Add or replace a verb, returning the handler it replaced.
    pub fn register(&mut self, verb: &'static str, handler: Handler) -> Option<Handler> {
        self.table.insert(verb, handler)
    }

    /// The handler for an uppercase verb.
    pub fn get(&self, verb: &str) -> Option<Handler> {
        self.table.get(verb).copied()
    }

    /// Registered verbs in registration order.
    pub fn verbs(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.table.keys().copied()
    }

    /// Number of registered verbs.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no verbs are registered.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.table.keys()).finish()
    }
}

/// Fallback for verbs nobody handles.
pub fn unknown(state: &mut CommandState, _: &mut Held<'_, Location>, _: &Context) -> Handled {
    if state.scheduled.is_some() {
        return Err(Halt::Stale);
    }
    Err(Halt::NoMatch("Eh?".to_owned()))
}

// ── Shared lookups ───────────────────────────────────────────────

/// Resolve the first word to something in `contents`.
///
/// `verb` fills the "no word" and "no match" messages, e.g. "hit".
pub(crate) fn target(
    state: &CommandState,
    contents: &Contents,
    verb: &str,
) -> Result<ThingId, Halt> {
    let Some(word) = state.words.first() else {
        return Err(Halt::NoMatch(format!("You go to {verb}... someone?")));
    };
    contents.find(word).ok_or_else(|| {
        let typed = state.input.first().unwrap_or(word);
        Halt::NoMatch(format!("You see no '{typed}' to {verb}."))
    })
}

/// The buffer addressing `thing`: the actor's or participant's own buffer
/// if it is one of them, otherwise a personal one.
pub(crate) fn tell<'m>(state: &'m mut CommandState, thing: &Thing) -> &'m mut Buffer {
    let id = thing.id();
    if id == state.actor {
        &mut state.msg.actor
    } else if Some(id) == state.participant {
        &mut state.msg.participant
    } else {
        state.msg.to(thing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_covers_events_and_moves() {
        let h = Handlers::standard();
        for kind in EventKind::ALL {
            assert!(h.get(kind.verb()).is_some(), "missing {kind}");
        }
        for verb in ["HIT", "FIGHT", "STOP", "LOOK", "QUIT", "N", "DOWN"] {
            assert!(h.get(verb).is_some(), "missing {verb}");
        }
        assert!(h.get("hit").is_none());
        assert!(h.get("DANCE").is_none());
    }

    #[test]
    fn register_replaces() {
        let mut h = Handlers::empty();
        assert!(h.register("LOOK", look).is_none());
        assert!(h.register("LOOK", unknown).is_some());
        assert_eq!(h.len(), 1);
        assert_eq!(h.verbs().collect::<Vec<_>>(), vec!["LOOK"]);
    }
}
