//! Per-connection session
//!
//! A [`Session`] binds one transport connection to at most one world. It turns
//! inbound [`ClientEvent`]s into World operations and owns the connection's
//! outbound queue. Dropping the session is the implicit disconnect: the player
//! leaves, their claims are cancelled, and an emptied world is destroyed.

use crate::broadcast::Outbox;
use crate::registry::Registry;
use crate::world::World;
use log::{debug, info, warn};
use shared::{ClientEvent, ConnectionId};
use std::sync::Arc;

pub struct Session {
    id: ConnectionId,
    registry: Arc<Registry>,
    outbox: Outbox,
    world: Option<Arc<World>>,
}

impl Session {
    pub fn new(id: ConnectionId, registry: Arc<Registry>, outbox: Outbox) -> Self {
        debug!("Session {} opened", id);
        Self {
            id,
            registry,
            outbox,
            world: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn world(&self) -> Option<&Arc<World>> {
        self.world.as_ref()
    }

    pub fn world_name(&self) -> Option<&str> {
        self.world.as_deref().map(World::name)
    }

    /// Applies one inbound event. Events before a successful join are ignored.
    pub fn handle(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::JoinWorld {
                world_name,
                player,
                level_name,
            } => {
                if world_name.is_empty() {
                    warn!("Session {} sent joinWorld without a world name", self.id);
                    return;
                }

                // Already here: keep the player and the world, just resync
                if let Some(world) = &self.world {
                    if world.name() == world_name {
                        debug!(
                            "Session {} re-joined '{}', resending snapshot",
                            self.id, world_name
                        );
                        world.resend_snapshot(self.id);
                        return;
                    }
                }

                // One world per connection
                self.leave_world();

                let (world, _) = self.registry.join(
                    &world_name,
                    level_name.as_deref(),
                    self.id,
                    player,
                    self.outbox.clone(),
                );
                self.world = Some(world);
            }

            ClientEvent::UpdatePlayer(update) => {
                if let Some(world) = &self.world {
                    world.move_player(self.id, update);
                }
            }

            ClientEvent::StartEating { collectible_id } => {
                if let Some(world) = &self.world {
                    world.start_claim(self.id, &collectible_id, false);
                }
            }

            ClientEvent::CollectItem { collectible_id } => {
                if let Some(world) = &self.world {
                    world.start_claim(self.id, &collectible_id, true);
                }
            }
        }
    }

    fn leave_world(&mut self) {
        if let Some(world) = self.world.take() {
            self.registry.leave(&world, self.id);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.leave_world();
        info!("Session {} closed", self.id);
    }
}
