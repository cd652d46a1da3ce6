//! A small brawl: two players, a goblin and a parrot in a three-room world.
//!
//! Demonstrates:
//!   1. Building a world with a peaceful location
//!   2. Starting an engine with a fixed seed
//!   3. Typed commands and scheduled combat rounds side by side
//!   4. Shutting down and reading the counters
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example brawl

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;
use warren_core::{Direction, Sink};
use warren_engine::{Engine, EngineConfig};
use warren_world::{Thing, World};

/// Prints every message block, prefixed with who received it.
struct Console(&'static str);

impl Sink for Console {
    fn deliver(&self, text: &str) {
        for line in text.lines() {
            println!("{:>6} | {line}", self.0);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut b = World::builder();
    let yard = b.location("Courtyard");
    let hall = b.location("Great Hall");
    let chapel = b.peaceful_location("Chapel", "A calm settles over you. You cannot fight here.");
    b.link(yard, Direction::North, hall)
        .link(yard, Direction::East, chapel)
        .start(yard);
    let world = b.build()?;

    let config = EngineConfig {
        round_duration: Duration::from_millis(400),
        corpse_cleanup_after: Duration::from_secs(2),
        seed: Some(2024),
        ..EngineConfig::default()
    };
    let mut engine = Engine::new(world, config)?;
    let yard = Arc::clone(&engine.world().starts()[0]);

    let ann = engine.spawn(
        Thing::player("Ann", Arc::new(Console("Ann"))).with_health(12),
        &yard,
    )?;
    let bob = engine.spawn(
        Thing::player("Bob", Arc::new(Console("Bob"))).with_health(12),
        &yard,
    )?;
    engine.spawn(
        Thing::new("a goblin")
            .with_the_name("the goblin")
            .with_alias("goblin")
            .with_health(9),
        &yard,
    )?;
    engine.spawn(
        Thing::new("a parrot")
            .with_the_name("the parrot")
            .with_alias("parrot")
            .with_action(
                Duration::from_millis(700),
                Duration::from_millis(300),
                &["The parrot squawks.", "The parrot ruffles its feathers."],
            ),
        &yard,
    )?;

    for (who, line) in [
        (ann, "look"),
        (bob, "hit goblin"),
        (ann, "fight goblin"),
        (bob, "east"),
        (bob, "hit ann"),
        (bob, "west"),
    ] {
        let done = engine.execute(who, line)?;
        info!(%who, line, outcome = ?done.outcome, passes = done.passes, "executed");
        thread::sleep(Duration::from_millis(150));
    }

    thread::sleep(Duration::from_secs(4));
    engine.execute(ann, "quit")?;

    let report = engine.shutdown();
    let metrics = engine.metrics();
    let stats = engine.scheduler_stats();
    println!("{metrics:#?}");
    println!("{stats:#?}");
    println!("{report:#?}");
    Ok(())
}
