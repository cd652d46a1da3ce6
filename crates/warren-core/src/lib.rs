//! Core types and traits for the Warren world engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the Warren workspace:
//! identifiers, the lock-handle contract, cancellation tokens, the
//! message sink and randomness seams, and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod dice;
pub mod error;
pub mod event;
pub mod id;
pub mod lock;
pub mod sink;

pub use dice::Dice;
pub use error::{ExecuteError, WorldError};
pub use event::{CancelToken, EventKind, Pending};
pub use id::{Direction, LockId, ThingId};
pub use lock::Lockable;
pub use sink::Sink;
