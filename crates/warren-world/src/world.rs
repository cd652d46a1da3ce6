//! The world: locations, start locations and the whereabouts index.
//!
//! The whereabouts index is a leaf lock. It may be taken while container
//! locks are held, but a container lock is never taken while holding it,
//! so it cannot take part in a circular wait.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::debug;
use warren_core::{Direction, Lockable, ThingId, WorldError};

use crate::location::Location;
use crate::thing::Thing;

/// A built world graph shared by every command execution.
pub struct World {
    locations: Vec<Arc<Location>>,
    starts: Vec<Arc<Location>>,
    whereabouts: RwLock<HashMap<ThingId, Weak<Location>>>,
}

impl World {
    /// Start building a world.
    pub fn builder() -> WorldBuilder {
        WorldBuilder::default()
    }

    /// All locations in build order.
    pub fn locations(&self) -> &[Arc<Location>] {
        &self.locations
    }

    /// Location by build index.
    pub fn location(&self, index: usize) -> Option<&Arc<Location>> {
        self.locations.get(index)
    }

    /// First location with the given name.
    pub fn find_location(&self, name: &str) -> Option<&Arc<Location>> {
        self.locations.iter().find(|l| l.name() == name)
    }

    /// Locations players are placed in and respawn at.
    pub fn starts(&self) -> &[Arc<Location>] {
        &self.starts
    }

    /// The container a thing was last recorded in.
    ///
    /// Read without holding any container lock, so the answer may be stale
    /// by the time the container is locked. Callers re-check under the lock.
    pub fn whereabouts(&self, id: ThingId) -> Option<Arc<Location>> {
        let index = self.whereabouts.read().unwrap_or_else(PoisonError::into_inner);
        index.get(&id).and_then(Weak::upgrade)
    }

    /// Record that a thing is now in `at`. Call while holding `at`'s lock.
    pub fn record(&self, id: ThingId, at: &Arc<Location>) {
        let mut index = self.whereabouts.write().unwrap_or_else(PoisonError::into_inner);
        index.insert(id, Arc::downgrade(at));
    }

    /// Forget a thing that has left the world.
    pub fn forget(&self, id: ThingId) {
        let mut index = self.whereabouts.write().unwrap_or_else(PoisonError::into_inner);
        index.remove(&id);
    }

    /// Number of things placed in the world.
    pub fn population(&self) -> usize {
        self.whereabouts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Put a thing into `at`, taking `at`'s lock for the duration.
    ///
    /// Intended for world set-up and connection handling, outside any
    /// command execution.
    pub fn place(&self, thing: Thing, at: &Arc<Location>) -> Result<ThingId, WorldError> {
        let id = thing.id();
        let mut contents = at.lock();
        if self.whereabouts(id).is_some() {
            return Err(WorldError::AlreadyPlaced { id });
        }
        contents.admit(thing);
        self.record(id, at);
        debug!(thing = %id, location = at.name(), "placed");
        Ok(id)
    }
}

/// Builder for [`World`].
///
/// Locations are referred to by the index returned from
/// [`location`](Self::location).
#[derive(Default)]
pub struct WorldBuilder {
    locations: Vec<Location>,
    links: Vec<(usize, Direction, usize)>,
    starts: Vec<usize>,
}

impl WorldBuilder {
    /// Add a location, returning its index.
    pub fn location(&mut self, name: impl Into<String>) -> usize {
        self.locations.push(Location::new(name));
        self.locations.len() - 1
    }

    /// Add a location where fighting is forbidden.
    pub fn peaceful_location(
        &mut self,
        name: impl Into<String>,
        veto: impl Into<String>,
    ) -> usize {
        self.locations
            .push(Location::new(name).with_veto_combat(veto));
        self.locations.len() - 1
    }

    /// Mark a location as a start location.
    pub fn start(&mut self, index: usize) -> &mut Self {
        self.starts.push(index);
        self
    }

    /// Link two locations both ways: `from` → `dir` → `to`, and back.
    pub fn link(&mut self, from: usize, dir: Direction, to: usize) -> &mut Self {
        self.links.push((from, dir, to));
        self.links.push((to, dir.reverse(), from));
        self
    }

    /// Link one way only.
    pub fn link_one_way(&mut self, from: usize, dir: Direction, to: usize) -> &mut Self {
        self.links.push((from, dir, to));
        self
    }

    /// Build the world.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownLocation`] if a link or start refers to a
    /// missing index, [`WorldError::NoStartLocations`] if no start was set.
    pub fn build(self) -> Result<World, WorldError> {
        let count = self.locations.len();
        let check = |index: usize| {
            if index < count {
                Ok(())
            } else {
                Err(WorldError::UnknownLocation { index })
            }
        };
        for &(from, _, to) in &self.links {
            check(from)?;
            check(to)?;
        }
        for &start in &self.starts {
            check(start)?;
        }
        if self.starts.is_empty() {
            return Err(WorldError::NoStartLocations);
        }

        let locations: Vec<Arc<Location>> = self.locations.into_iter().map(Arc::new).collect();
        for (from, dir, to) in self.links {
            locations[from].lock().link(dir, &locations[to]);
        }
        let starts = self
            .starts
            .iter()
            .map(|&i| Arc::clone(&locations[i]))
            .collect();

        Ok(World {
            locations,
            starts,
            whereabouts: RwLock::new(HashMap::new()),
        })
    }
}
