//! Reusable worlds and inhabitants.
//!
//! - [`arena`]: a fighting room with a corridor to the north and a
//!   peaceful shrine to the east.
//! - [`ring`]: `n` rooms linked east/west in a loop.
//! - [`goblin`], [`statue`], [`player`]: typical inhabitants.

use std::sync::Arc;
use std::time::Duration;

use warren_core::Direction;
use warren_world::{Location, Thing, World};

use crate::Inbox;

/// Veto text used by the shrine in [`arena`].
pub const SHRINE_VETO: &str = "The gods forbid fighting here.";

/// Handles to the locations of [`arena`].
pub struct Arena {
    pub world: World,
    pub arena: Arc<Location>,
    pub corridor: Arc<Location>,
    pub shrine: Arc<Location>,
}

/// Arena (start) ↔ north ↔ Corridor, Arena ↔ east ↔ Shrine.
pub fn arena() -> Arena {
    let mut b = World::builder();
    let arena = b.location("Arena");
    let corridor = b.location("Corridor");
    let shrine = b.peaceful_location("Shrine", SHRINE_VETO);
    b.link(arena, Direction::North, corridor)
        .link(arena, Direction::East, shrine)
        .start(arena);
    let world = match b.build() {
        Ok(w) => w,
        Err(e) => panic!("arena fixture: {e}"),
    };
    let get = |i: usize| match world.location(i) {
        Some(l) => Arc::clone(l),
        None => panic!("arena fixture: missing location {i}"),
    };
    Arena {
        arena: get(arena),
        corridor: get(corridor),
        shrine: get(shrine),
        world,
    }
}

/// `n` rooms in an east/west loop; room 0 is the only start.
pub fn ring(n: usize) -> World {
    assert!(n >= 2, "a ring needs at least two rooms");
    let mut b = World::builder();
    let rooms: Vec<usize> = (0..n).map(|i| b.location(format!("Room {i}"))).collect();
    for i in 0..n {
        b.link(rooms[i], Direction::East, rooms[(i + 1) % n]);
    }
    b.start(rooms[0]);
    match b.build() {
        Ok(w) => w,
        Err(e) => panic!("ring fixture: {e}"),
    }
}

/// A killable non-player with `health` points.
pub fn goblin(health: i64) -> Thing {
    Thing::new("a goblin")
        .with_the_name("the goblin")
        .with_alias("goblin")
        .with_description("A small, mean-looking goblin.")
        .with_health(health)
}

/// A thing that cannot be killed: it stands among actors with zero
/// maximum health.
pub fn statue() -> Thing {
    Thing::new("a statue")
        .with_the_name("the statue")
        .with_alias("statue")
        .with_health(0)
}

/// A connected player with `health` points, and its inbox.
pub fn player(name: &str, health: i64) -> (Thing, Inbox) {
    let (sink, inbox) = Inbox::pair();
    (Thing::player(name, sink).with_health(health), inbox)
}

/// A mob that chatters every `after` with no jitter.
pub fn chatterbox(after: Duration) -> Thing {
    Thing::new("a parrot")
        .with_the_name("the parrot")
        .with_alias("parrot")
        .with_action(after, Duration::ZERO, &["The parrot squawks."])
}
