//! World registry
//!
//! Maps world names to live [`World`] instances. Worlds are created lazily on
//! the first join and destroyed as soon as their last player leaves, so memory
//! only ever holds worlds that somebody is playing in.
//!
//! The name map is guarded by its own short-lived lock; per-world state has a
//! lock of its own inside [`World`], so unrelated worlds never contend. Where
//! both are needed the order is always registry first, then world.

use crate::broadcast::Outbox;
use crate::level_store::LevelStore;
use crate::world::{Departure, Joined, World};
use log::{info, warn};
use shared::{ConnectionId, PlayerInit};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct Registry {
    worlds: Mutex<HashMap<String, Arc<World>>>,
    levels: Arc<LevelStore>,
    default_level: String,
}

impl Registry {
    pub fn new(levels: Arc<LevelStore>, default_level: &str) -> Self {
        Self {
            worlds: Mutex::new(HashMap::new()),
            levels,
            default_level: default_level.to_string(),
        }
    }

    fn worlds(&self) -> MutexGuard<'_, HashMap<String, Arc<World>>> {
        self.worlds.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn levels(&self) -> &Arc<LevelStore> {
        &self.levels
    }

    pub fn default_level(&self) -> &str {
        &self.default_level
    }

    pub fn get(&self, world_name: &str) -> Option<Arc<World>> {
        self.worlds().get(world_name).cloned()
    }

    /// Returns the world called `world_name`, creating it from `level_name` if needed.
    ///
    /// The level is only consulted on creation; an existing world keeps the
    /// level it was created with. An unavailable level yields a world with no
    /// collectibles that is still usable for movement.
    pub fn get_or_create(&self, world_name: &str, level_name: Option<&str>) -> Arc<World> {
        if let Some(world) = self.get(world_name) {
            return world;
        }

        let level_name = level_name.unwrap_or(self.default_level.as_str());
        let level = match self.levels.load(level_name) {
            Ok(level) => Some(level),
            Err(e) => {
                warn!(
                    "World '{}' starts without collectibles: {}",
                    world_name, e
                );
                None
            }
        };

        // Another session may have created it while the level was loading
        let mut worlds = self.worlds();
        let world = worlds.entry(world_name.to_string()).or_insert_with(|| {
            info!("Created world '{}' from level '{}'", world_name, level_name);
            World::new(world_name, level_name, level.as_deref())
        });
        Arc::clone(world)
    }

    /// Destroys the named world if it has no players left
    pub fn remove_if_empty(&self, world_name: &str) -> bool {
        let mut worlds = self.worlds();
        let Some(world) = worlds.get(world_name) else {
            return false;
        };
        if !world.close_if_empty() {
            return false;
        }
        worlds.remove(world_name);
        info!("Destroyed empty world '{}'", world_name);
        true
    }

    /// Joins a world, retrying if the world found was destroyed before the join landed
    pub fn join(
        &self,
        world_name: &str,
        level_name: Option<&str>,
        id: ConnectionId,
        init: PlayerInit,
        outbox: Outbox,
    ) -> (Arc<World>, Joined) {
        loop {
            let world = self.get_or_create(world_name, level_name);
            if let Some(joined) = world.join(id, init.clone(), outbox.clone()) {
                return (world, joined);
            }
        }
    }

    /// Removes a player from `world` and destroys the world if that emptied it
    pub fn leave(&self, world: &World, id: ConnectionId) -> Option<Departure> {
        let departure = world.leave(id);
        if departure.as_ref().map_or(false, |d| d.now_empty) {
            self.remove_if_empty(world.name());
        }
        departure
    }

    pub fn world_count(&self) -> usize {
        self.worlds().len()
    }

    pub fn world_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.worlds().keys().cloned().collect();
        names.sort();
        names
    }
}
