//! Authoritative state for one named world
//!
//! A World owns the player table and the collectible table of a single
//! session. Both tables live behind one mutex, and every operation here is a
//! synchronous state transition performed while holding it. Outbound events
//! are pushed into the members' queues from inside the same critical section,
//! so every client observes mutations in the order they were applied.
//!
//! ## Collectible lifecycle
//!
//! ```text
//! Available --start_claim--> Claimed{by, started_at, duration_ms}
//!     ^                          |            |
//!     +------- cancellation -----+            +--finalize--> Collected{by}
//! ```
//!
//! `Collected` is terminal. A timed claim is finalized by a tokio task that
//! sleeps for the chew duration and then re-enters the World through a
//! `Weak` reference. Each claim carries a ticket, and a timer only finalizes
//! the claim it was scheduled for, so a superseded timer that already woke
//! up cannot complete a newer claim early.

use crate::broadcast::{Broadcaster, Outbox};
use crate::timers::ChewTimers;
use crate::utils::get_timestamp;
use log::{debug, info};
use shared::{
    score_delta, ChewSpeed, CollectibleId, CollectibleTemplate, CollectibleView, ConnectionId,
    Level, PlayerInit, PlayerState, PlayerUpdate, Point, RejectReason, ServerEvent,
    DEFAULT_SPAWN_X, DEFAULT_SPAWN_Y,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::{sleep, Duration};

/// Claim state of a single collectible
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    Available,
    Claimed {
        by: ConnectionId,
        started_at: u64,
        duration_ms: u64,
        ticket: u64,
    },
    Collected {
        by: ConnectionId,
    },
}

/// A World's own copy of a level collectible plus its claim state
#[derive(Debug, Clone)]
pub struct Collectible {
    template: CollectibleTemplate,
    state: ClaimState,
}

impl Collectible {
    pub fn from_template(template: CollectibleTemplate) -> Self {
        Self {
            template,
            state: ClaimState::Available,
        }
    }

    pub fn id(&self) -> &str {
        &self.template.id
    }

    pub fn tags(&self) -> &[String] {
        &self.template.tags
    }

    pub fn state(&self) -> &ClaimState {
        &self.state
    }

    pub fn view(&self) -> CollectibleView {
        let (claimed_by, claimed_at, chew_duration_ms) = match self.state {
            ClaimState::Claimed {
                by,
                started_at,
                duration_ms,
                ..
            } => (Some(by), Some(started_at), Some(duration_ms)),
            _ => (None, None, None),
        };
        let collected_by = match self.state {
            ClaimState::Collected { by } => Some(by),
            _ => None,
        };

        CollectibleView {
            id: self.template.id.clone(),
            tags: self.template.tags.clone(),
            claimed_by,
            claimed_at,
            chew_duration_ms,
            collected: collected_by.is_some(),
            collected_by,
            display: self.template.display.clone(),
        }
    }
}

/// What a successful join produced
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    pub player: PlayerState,
    /// Full state, sent to the joining session only
    pub snapshot: ServerEvent,
    /// Sent to everyone else in the world
    pub announcement: ServerEvent,
}

/// What a departure produced
#[derive(Debug, Clone, PartialEq)]
pub struct Departure {
    pub announcement: ServerEvent,
    pub cancelled: Vec<CollectibleId>,
    pub now_empty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// Timed chew started; a finalize is scheduled after `duration_ms`
    Started { duration_ms: u64 },
    /// Zero-length claim, finalized on the spot
    Finalized(FinalizeOutcome),
    Rejected(RejectReason),
    /// No collectible with that id exists in this world
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    Collected { score: i64, delta: i64 },
    /// The claimer was gone, so the collectible went back to available
    Cancelled,
    /// The claim this finalize was meant for no longer exists
    Stale,
}

struct WorldState {
    players: BTreeMap<ConnectionId, PlayerState>,
    collectibles: BTreeMap<CollectibleId, Collectible>,
    fanout: Broadcaster,
    timers: ChewTimers,
    next_ticket: u64,
    closed: bool,
}

impl WorldState {
    fn snapshot(&self, level_name: &str, self_id: ConnectionId) -> ServerEvent {
        ServerEvent::WorldData {
            self_id,
            players: self.players.values().cloned().collect(),
            collectibles: self.collectibles.values().map(Collectible::view).collect(),
            level_name: level_name.to_string(),
        }
    }

    fn cancel_claims_for(&mut self, id: ConnectionId) -> Vec<CollectibleId> {
        let mut cancelled = Vec::new();
        for collectible in self.collectibles.values_mut() {
            if !matches!(collectible.state, ClaimState::Claimed { by, .. } if by == id) {
                continue;
            }
            collectible.state = ClaimState::Available;
            self.timers.cancel(collectible.id());
            let event = ServerEvent::ChewCancelled {
                id: collectible.id().to_string(),
            };
            self.fanout.broadcast(&event, None);
            cancelled.push(collectible.id().to_string());
        }
        cancelled
    }

    /// `ticket` pins the finalize to one specific claim; `None` accepts any claim by `by`
    fn finalize(
        &mut self,
        collectible_id: &str,
        by: ConnectionId,
        ticket: Option<u64>,
    ) -> FinalizeOutcome {
        let Some(collectible) = self.collectibles.get_mut(collectible_id) else {
            return FinalizeOutcome::Stale;
        };
        match collectible.state {
            ClaimState::Claimed {
                by: holder,
                ticket: current,
                ..
            } if holder == by && ticket.map_or(true, |t| t == current) => {}
            _ => return FinalizeOutcome::Stale,
        }

        self.timers.cancel(collectible_id);
        collectible.state = ClaimState::Collected { by };

        let Some(player) = self.players.get_mut(&by) else {
            // Nobody left to reward
            collectible.state = ClaimState::Available;
            let event = ServerEvent::ChewCancelled {
                id: collectible_id.to_string(),
            };
            self.fanout.broadcast(&event, None);
            return FinalizeOutcome::Cancelled;
        };

        let delta = score_delta(collectible.tags());
        player.score += delta;
        let score = player.score;
        info!(
            "Player {} collected '{}' (delta {}, score {})",
            by, collectible_id, delta, score
        );

        let event = ServerEvent::ItemCollected {
            id: collectible_id.to_string(),
            by,
            score,
            delta,
        };
        self.fanout.broadcast(&event, None);
        FinalizeOutcome::Collected { score, delta }
    }
}

/// One named world: its players, collectibles and pending chew timers
pub struct World {
    name: String,
    level_name: String,
    spawn: Point,
    state: Mutex<WorldState>,
}

impl World {
    /// Creates a world seeded from `level`, or with no collectibles when the level is unavailable
    pub fn new(name: &str, level_name: &str, level: Option<&Level>) -> Arc<Self> {
        let collectibles = level
            .map(|level| {
                level
                    .collectibles
                    .iter()
                    .map(|template| {
                        (
                            template.id.clone(),
                            Collectible::from_template(template.clone()),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        let spawn = level.map(|level| level.spawn).unwrap_or(Point {
            x: DEFAULT_SPAWN_X,
            y: DEFAULT_SPAWN_Y,
        });

        Arc::new(Self {
            name: name.to_string(),
            level_name: level_name.to_string(),
            spawn,
            state: Mutex::new(WorldState {
                players: BTreeMap::new(),
                collectibles,
                fanout: Broadcaster::new(),
                timers: ChewTimers::new(),
                next_ticket: 0,
                closed: false,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level_name(&self) -> &str {
        &self.level_name
    }

    fn lock(&self) -> MutexGuard<'_, WorldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a player, sends them the snapshot and announces them to everyone else.
    ///
    /// Returns `None` if the world was destroyed in the meantime; the caller
    /// should go back to the registry for a fresh one.
    pub fn join(
        &self,
        id: ConnectionId,
        init: PlayerInit,
        outbox: Outbox,
    ) -> Option<Joined> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }

        let player = PlayerState::new(id, init, self.spawn, get_timestamp());
        state.players.insert(id, player.clone());
        state.fanout.add(id, outbox);

        let snapshot = state.snapshot(&self.level_name, id);
        let announcement = ServerEvent::PlayerJoined(player.clone());
        state.fanout.send_to(id, snapshot.clone());
        state.fanout.broadcast(&announcement, Some(id));

        info!(
            "Player {} ('{}') joined world '{}' ({} players)",
            id,
            player.name,
            self.name,
            state.players.len()
        );

        Some(Joined {
            player,
            snapshot,
            announcement,
        })
    }

    /// Sends a fresh snapshot to a player who is already here. No-op otherwise.
    pub fn resend_snapshot(&self, id: ConnectionId) -> Option<ServerEvent> {
        let state = self.lock();
        if !state.players.contains_key(&id) {
            return None;
        }
        let snapshot = state.snapshot(&self.level_name, id);
        state.fanout.send_to(id, snapshot.clone());
        Some(snapshot)
    }

    /// Last-writer-wins position update. No-op if the player is not here.
    pub fn move_player(&self, id: ConnectionId, update: PlayerUpdate) -> Option<ServerEvent> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let player = state.players.get_mut(&id)?;
        player.apply_update(update, get_timestamp());
        debug!(
            "Player {} moved to ({:.1}, {:.1}) in '{}'",
            id, player.x, player.y, self.name
        );

        let event = ServerEvent::PlayerMoved(player.clone());
        state.fanout.broadcast(&event, Some(id));
        Some(event)
    }

    /// Removes a player. Their claims are cancelled before the player record
    /// goes away, and before the departure is announced.
    pub fn leave(&self, id: ConnectionId) -> Option<Departure> {
        let mut state = self.lock();
        state.fanout.remove(id);
        if !state.players.contains_key(&id) {
            return None;
        }

        let cancelled = state.cancel_claims_for(id);
        state.players.remove(&id);

        let announcement = ServerEvent::PlayerLeft { id };
        state.fanout.broadcast(&announcement, Some(id));

        info!(
            "Player {} left world '{}' ({} players, {} claims cancelled)",
            id,
            self.name,
            state.players.len(),
            cancelled.len()
        );

        Some(Departure {
            announcement,
            cancelled,
            now_empty: state.players.is_empty(),
        })
    }

    /// Starts a claim on a collectible.
    ///
    /// Rejections are sent to the requester only. A timed claim announces
    /// `chewStarted` to the whole world and schedules its finalize; an
    /// immediate claim is finalized before this returns.
    pub fn start_claim(
        self: &Arc<Self>,
        id: ConnectionId,
        collectible_id: &str,
        immediate: bool,
    ) -> ClaimOutcome {
        let mut guard = self.lock();
        let state = &mut *guard;

        let Some(collectible) = state.collectibles.get(collectible_id) else {
            debug!(
                "Player {} tried to claim unknown collectible '{}' in '{}'",
                id, collectible_id, self.name
            );
            return ClaimOutcome::Unknown;
        };

        let rejection = match collectible.state {
            ClaimState::Collected { .. } => Some(RejectReason::Collected),
            ClaimState::Claimed { by, .. } if by != id => Some(RejectReason::Claimed),
            ClaimState::Claimed { .. } if !immediate => Some(RejectReason::InProgress),
            _ if !state.players.contains_key(&id) => Some(RejectReason::PlayerMissing),
            _ => None,
        };
        if let Some(reason) = rejection {
            debug!(
                "Claim on '{}' by {} rejected: {:?}",
                collectible_id, id, reason
            );
            state.fanout.send_to(
                id,
                ServerEvent::ChewRejected {
                    id: collectible_id.to_string(),
                    reason,
                },
            );
            return ClaimOutcome::Rejected(reason);
        }

        let duration_ms = if immediate {
            0
        } else {
            ChewSpeed::from_tags(collectible.tags()).duration_ms()
        };

        state.timers.cancel(collectible_id);
        state.next_ticket += 1;
        let ticket = state.next_ticket;
        if let Some(collectible) = state.collectibles.get_mut(collectible_id) {
            collectible.state = ClaimState::Claimed {
                by: id,
                started_at: get_timestamp(),
                duration_ms,
                ticket,
            };
        }

        if duration_ms == 0 {
            return ClaimOutcome::Finalized(state.finalize(collectible_id, id, Some(ticket)));
        }

        state.fanout.broadcast(
            &ServerEvent::ChewStarted {
                id: collectible_id.to_string(),
                by: id,
                duration: duration_ms,
            },
            None,
        );

        let world = Arc::downgrade(self);
        let key = collectible_id.to_string();
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(duration_ms)).await;
            if let Some(world) = world.upgrade() {
                world.finalize_scheduled(&key, id, ticket);
            }
        });
        state
            .timers
            .schedule(collectible_id.to_string(), handle.abort_handle());

        debug!(
            "Player {} started chewing '{}' for {}ms",
            id, collectible_id, duration_ms
        );
        ClaimOutcome::Started { duration_ms }
    }

    /// Completes `by`'s claim on a collectible, whichever claim that is
    pub fn finalize(&self, collectible_id: &str, by: ConnectionId) -> FinalizeOutcome {
        self.lock().finalize(collectible_id, by, None)
    }

    fn finalize_scheduled(&self, collectible_id: &str, by: ConnectionId, ticket: u64) {
        let outcome = self.lock().finalize(collectible_id, by, Some(ticket));
        debug!(
            "Chew timer for '{}' in '{}' fired: {:?}",
            collectible_id, self.name, outcome
        );
    }

    /// Releases every in-progress claim held by `id` and announces each cancellation
    pub fn cancel_claims_for(&self, id: ConnectionId) -> Vec<CollectibleId> {
        self.lock().cancel_claims_for(id)
    }

    /// Marks the world dead and aborts its timers if nobody is left in it
    pub(crate) fn close_if_empty(&self) -> bool {
        let mut state = self.lock();
        if !state.players.is_empty() {
            return false;
        }
        state.closed = true;
        let aborted = state.timers.cancel_all();
        if aborted > 0 {
            debug!("Aborted {} chew timers in '{}'", aborted, self.name);
        }
        true
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn player(&self, id: ConnectionId) -> Option<PlayerState> {
        self.lock().players.get(&id).cloned()
    }

    pub fn player_count(&self) -> usize {
        self.lock().players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().players.is_empty()
    }

    pub fn collectible_state(&self, collectible_id: &str) -> Option<ClaimState> {
        self.lock()
            .collectibles
            .get(collectible_id)
            .map(|c| c.state.clone())
    }

    pub fn collectible_count(&self) -> usize {
        self.lock().collectibles.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.lock().timers.len()
    }
}
