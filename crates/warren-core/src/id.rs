//! Strongly-typed identifiers and the [`Direction`] of a location exit.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`ThingId`] allocation.
static THING_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Counter for unique [`LockId`] allocation.
static LOCK_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a thing (actor, item, corpse).
///
/// Allocated from a monotonic atomic counter via [`ThingId::next`]. The id
/// never changes for the lifetime of the thing and is independent of any
/// of its mutable attributes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThingId(pub u64);

impl ThingId {
    /// Allocate a fresh, unique thing ID. Thread-safe.
    pub fn next() -> Self {
        Self(THING_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ThingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for ThingId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Total-order key fixing the acquisition order of container locks.
///
/// Every container that can be locked carries one. Two containers never
/// share a `LockId`; locks are always taken lowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockId(pub u64);

impl LockId {
    /// Allocate a fresh, unique lock ID. Thread-safe.
    pub fn next() -> Self {
        Self(LOCK_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for LockId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Direction of an exit between two locations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// North.
    North,
    /// Northeast.
    Northeast,
    /// East.
    East,
    /// Southeast.
    Southeast,
    /// South.
    South,
    /// Southwest.
    Southwest,
    /// West.
    West,
    /// Northwest.
    Northwest,
    /// Up.
    Up,
    /// Down.
    Down,
}

impl Direction {
    /// All directions in display order.
    pub const ALL: [Direction; 10] = [
        Direction::North,
        Direction::Northeast,
        Direction::East,
        Direction::Southeast,
        Direction::South,
        Direction::Southwest,
        Direction::West,
        Direction::Northwest,
        Direction::Up,
        Direction::Down,
    ];

    /// The direction leading back the way you came.
    pub fn reverse(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::Northeast => Self::Southwest,
            Self::East => Self::West,
            Self::Southeast => Self::Northwest,
            Self::South => Self::North,
            Self::Southwest => Self::Northeast,
            Self::West => Self::East,
            Self::Northwest => Self::Southeast,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    /// Lowercase long name, e.g. `"northeast"`.
    pub fn name(self) -> &'static str {
        match self {
            Self::North => "north",
            Self::Northeast => "northeast",
            Self::East => "east",
            Self::Southeast => "southeast",
            Self::South => "south",
            Self::Southwest => "southwest",
            Self::West => "west",
            Self::Northwest => "northwest",
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Parse an uppercased command word, accepting long and short forms.
    pub fn from_word(word: &str) -> Option<Self> {
        let dir = match word {
            "N" | "NORTH" => Self::North,
            "NE" | "NORTHEAST" => Self::Northeast,
            "E" | "EAST" => Self::East,
            "SE" | "SOUTHEAST" => Self::Southeast,
            "S" | "SOUTH" => Self::South,
            "SW" | "SOUTHWEST" => Self::Southwest,
            "W" | "WEST" => Self::West,
            "NW" | "NORTHWEST" => Self::Northwest,
            "U" | "UP" => Self::Up,
            "D" | "DOWN" => Self::Down,
            _ => return None,
        };
        Some(dir)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Direction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_word(&s.to_uppercase()).ok_or(())
    }
}
