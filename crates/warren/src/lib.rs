//! Warren: a concurrent MUD core.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Warren sub-crates. For most users, adding `warren` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use warren::prelude::*;
//!
//! let mut b = World::builder();
//! let hall = b.location("Hall");
//! let yard = b.location("Yard");
//! b.link(hall, Direction::North, yard).start(hall);
//! let world = b.build().unwrap();
//!
//! let engine = Engine::new(world, EngineConfig::default()).unwrap();
//! let hall = Arc::clone(&engine.world().starts()[0]);
//!
//! let (tx, rx) = crossbeam_channel::unbounded::<String>();
//! let ann = engine
//!     .spawn(Thing::player("Ann", Arc::new(tx)).with_health(10), &hall)
//!     .unwrap();
//!
//! let done = engine.execute(ann, "north").unwrap();
//! assert_eq!(done.outcome, Outcome::Completed);
//! assert!(rx.try_recv().unwrap().starts_with("[Yard]"));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `warren-core` | IDs, event kinds, cancel tokens, the lock, sink and dice seams, errors |
//! | [`world`] | `warren-world` | Things, locations and the world graph |
//! | [`engine`] | `warren-engine` | Resource sets, the execution cycle, the scheduler and commands |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`warren-core`).
pub use warren_core as types;

/// Things, locations and the world graph (`warren-world`).
///
/// Every thing lives inside the lock-protected contents of exactly one
/// [`world::Location`].
pub use warren_world as world;

/// The execution engine (`warren-engine`).
///
/// [`engine::Engine`] owns the timer and dispatch threads;
/// [`engine::Context::execute`] runs one command.
pub use warren_engine as engine;

/// Common imports for typical Warren usage.
///
/// ```rust
/// use warren::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use warren_core::{CancelToken, Dice, Direction, EventKind, Lockable, Sink, ThingId};

    // Errors
    pub use warren_core::{ExecuteError, WorldError};
    pub use warren_engine::{ConfigError, SchedulerError};

    // World
    pub use warren_world::{Location, Thing, World, WorldBuilder};

    // Engine
    pub use warren_engine::{
        CommandState, Context, Engine, EngineConfig, Executed, Halt, Handled, Handlers, Input,
        Outcome,
    };
}
