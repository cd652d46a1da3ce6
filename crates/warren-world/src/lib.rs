//! In-memory entity graph for the Warren world engine.
//!
//! Things live inside the mutex-protected [`Contents`] of a [`Location`],
//! so every read or write of a thing happens while its container's lock
//! is held. The [`World`] keeps the location list, the start locations,
//! and a whereabouts index mapping each placed thing to its container.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod location;
pub mod thing;
pub mod world;

pub use location::{Contents, Location};
pub use thing::{ActionSpec, CleanupSpec, Events, Health, Session, Thing};
pub use world::{World, WorldBuilder};
