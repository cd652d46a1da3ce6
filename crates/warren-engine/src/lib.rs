//! Lock-ordered command execution for the Warren world engine.
//!
//! Every command, typed or fired by the timer, runs through the same
//! execution cycle: lock the locations in its [`ResourceSet`] in ascending
//! [`LockId`](warren_core::LockId) order, run the handler, and if the
//! handler discovered it needs more locations, release everything and try
//! again with the larger set. Text is delivered only after every lock is
//! released.
//!
//! - [`resource`]: the ordered lock set.
//! - [`cycle`]: acquisition, the retry loop and the [`Held`] guard set.
//! - [`scheduler`]: the cancellable, jittered timer.
//! - [`engine`]: the shared [`Context`], the [`Engine`] and its threads.
//! - [`commands`]: HIT, FIGHT, STOP, LOOK, movement, QUIT and the event
//!   handlers.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod commands;
pub mod config;
pub mod cycle;
pub mod dice;
pub mod engine;
pub mod metrics;
pub mod resource;
pub mod scheduler;
pub mod state;

pub use commands::{Handler, Handlers};
pub use config::{ConfigError, EngineConfig};
pub use cycle::{Cycle, Held};
pub use dice::SeededDice;
pub use engine::{
    Context, Engine, EngineBuilder, Executed, Input, Outcome, ShutdownReport,
};
pub use metrics::{EngineMetrics, MetricsSnapshot};
pub use resource::{LockList, ResourceSet};
pub use scheduler::{
    Fired, Scheduler, SchedulerError, SchedulerHandle, SchedulerShutdown, SchedulerSnapshot,
    SchedulerStats,
};
pub use state::{Buffer, CommandState, Halt, Handled, Messages, Scratch};
