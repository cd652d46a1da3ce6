//! Benchmark worlds for the Warren world engine.
//!
//! - [`grid`]: a `width × height` grid of rooms linked in four directions
//! - [`populate`]: spread silent players over every room

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;

use warren_core::{Direction, Sink, ThingId, WorldError};
use warren_engine::Engine;
use warren_world::{Thing, World};

/// A sink that discards everything.
pub struct Mute;

impl Sink for Mute {
    fn deliver(&self, _text: &str) {}
}

/// A `width × height` grid. Room `(0, 0)` is the only start location.
pub fn grid(width: usize, height: usize) -> Result<World, WorldError> {
    let mut b = World::builder();
    let rooms: Vec<usize> = (0..width * height)
        .map(|i| b.location(format!("Room {},{}", i % width, i / width)))
        .collect();
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            if x + 1 < width {
                b.link(rooms[i], Direction::East, rooms[i + 1]);
            }
            if y + 1 < height {
                b.link(rooms[i], Direction::South, rooms[i + width]);
            }
        }
    }
    if let Some(&first) = rooms.first() {
        b.start(first);
    }
    b.build()
}

/// Spawn `count` mute players with `health`, round-robin over every room.
pub fn populate(engine: &Engine, count: usize, health: i64) -> Result<Vec<ThingId>, WorldError> {
    let locations = engine.world().locations();
    if locations.is_empty() {
        return Ok(Vec::new());
    }
    (0..count)
        .map(|i| {
            let bot = Thing::player(format!("Bot{i}"), Arc::new(Mute)).with_health(health);
            engine.spawn(bot, &locations[i % locations.len()])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_engine::EngineConfig;

    #[test]
    fn grid_links_neighbours() {
        let world = grid(3, 2).unwrap();
        assert_eq!(world.locations().len(), 6);
        assert_eq!(world.starts().len(), 1);
        let corner = world.find_location("Room 0,0").unwrap();
        let exits = warren_core::Lockable::lock(corner.as_ref()).exit_directions();
        assert_eq!(exits, vec![Direction::East, Direction::South]);
    }

    #[test]
    fn populate_round_robins() {
        let engine = Engine::new(grid(2, 2).unwrap(), EngineConfig::default()).unwrap();
        let bots = populate(&engine, 6, 10).unwrap();
        assert_eq!(bots.len(), 6);
        assert_eq!(engine.world().population(), 6);
    }
}
