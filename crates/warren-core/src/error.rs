//! Error types shared across the Warren workspace.
//!
//! Command-level outcomes such as "no match" or "vetoed" are not errors:
//! they are reported to the actor and the cycle completes normally. The
//! types here cover failures of the invocation itself and of world
//! construction.

use std::error::Error;
use std::fmt;

use crate::id::ThingId;

/// Failure of a single command invocation.
///
/// Never affects other invocations: each one owns its resource set and
/// lock guards exclusively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecuteError {
    /// The handler panicked. All locks were released during unwinding.
    HandlerPanicked {
        /// The verb being executed.
        verb: String,
        /// The actor the command ran for.
        actor: ThingId,
    },
    /// The engine has shut down and no longer accepts commands.
    ShuttingDown,
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandlerPanicked { verb, actor } => {
                write!(f, "handler for '{verb}' panicked while executing for {actor}")
            }
            Self::ShuttingDown => write!(f, "engine is shutting down"),
        }
    }
}

impl Error for ExecuteError {}

/// Errors from building or populating a world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorldError {
    /// The world has no start locations to place or respawn players.
    NoStartLocations,
    /// A location index passed to the builder does not exist.
    UnknownLocation {
        /// The offending index.
        index: usize,
    },
    /// A thing with this id is already placed in the world.
    AlreadyPlaced {
        /// The duplicate id.
        id: ThingId,
    },
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoStartLocations => write!(f, "world has no start locations"),
            Self::UnknownLocation { index } => write!(f, "no location at index {index}"),
            Self::AlreadyPlaced { id } => write!(f, "thing {id} is already placed"),
        }
    }
}

impl Error for WorldError {}
