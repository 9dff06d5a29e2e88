use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type ConnectionId = u32;
pub type CollectibleId = String;

pub const DEFAULT_SPAWN_X: f32 = 200.0;
pub const DEFAULT_SPAWN_Y: f32 = 200.0;
pub const DEFAULT_CHEW_MS: u64 = 2000;

pub const GOOD_TAG: &str = "good";
pub const BAD_TAG: &str = "bad";
pub const CHEW_TAG_PREFIX: &str = "chew:";

/// How long a collectible takes to eat, read from its `chew:<speed>` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChewSpeed {
    Soft,
    #[default]
    Default,
    Crunchy,
    Chewy,
    Hard,
    Tough,
}

impl ChewSpeed {
    pub fn from_tag(tag: &str) -> Option<Self> {
        let speed = tag.strip_prefix(CHEW_TAG_PREFIX)?;
        match speed {
            "soft" => Some(ChewSpeed::Soft),
            "default" => Some(ChewSpeed::Default),
            "crunchy" => Some(ChewSpeed::Crunchy),
            "chewy" => Some(ChewSpeed::Chewy),
            "hard" => Some(ChewSpeed::Hard),
            "tough" => Some(ChewSpeed::Tough),
            _ => None,
        }
    }

    /// First recognised `chew:` tag wins; anything else falls back to the default speed.
    pub fn from_tags(tags: &[String]) -> Self {
        tags.iter()
            .find_map(|tag| ChewSpeed::from_tag(tag))
            .unwrap_or_default()
    }

    pub fn duration_ms(self) -> u64 {
        match self {
            ChewSpeed::Soft => 1500,
            ChewSpeed::Default => DEFAULT_CHEW_MS,
            ChewSpeed::Crunchy => 2200,
            ChewSpeed::Chewy => 2600,
            ChewSpeed::Hard => 3200,
            ChewSpeed::Tough => 3800,
        }
    }
}

/// Score change for fully eating a collectible with these tags.
pub fn score_delta(tags: &[String]) -> i64 {
    if tags.iter().any(|t| t == GOOD_TAG) {
        1
    } else if tags.iter().any(|t| t == BAD_TAG) {
        -1
    } else {
        0
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

fn default_spawn() -> Point {
    Point {
        x: DEFAULT_SPAWN_X,
        y: DEFAULT_SPAWN_Y,
    }
}

/// Collectible as authored in a level file. Display fields are kept verbatim.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CollectibleTemplate {
    pub id: CollectibleId,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub display: Map<String, Value>,
}

impl CollectibleTemplate {
    pub fn new(id: &str, tags: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            display: Map::new(),
        }
    }
}

/// Static level definition. Decorations are cosmetic and never inspected by the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Level {
    pub bounds: Bounds,
    #[serde(default = "default_spawn")]
    pub spawn: Point,
    #[serde(default)]
    pub decorations: Vec<Value>,
    #[serde(default)]
    pub collectibles: Vec<CollectibleTemplate>,
}

impl Level {
    pub fn empty(width: f32, height: f32) -> Self {
        Self {
            bounds: Bounds { width, height },
            spawn: default_spawn(),
            decorations: Vec::new(),
            collectibles: Vec::new(),
        }
    }
}

/// Avatar and placement a client supplies when joining.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct PlayerInit {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub collar: String,
    #[serde(default)]
    pub hat: String,
    #[serde(default)]
    pub score: Option<i64>,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub facing: Option<f32>,
}

/// Partial movement update; absent fields keep their previous value.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct PlayerUpdate {
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub facing: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: ConnectionId,
    pub name: String,
    pub color: String,
    pub collar: String,
    pub hat: String,
    pub x: f32,
    pub y: f32,
    pub facing: f32,
    pub score: i64,
    pub last_update: u64,
}

impl PlayerState {
    pub fn new(id: ConnectionId, init: PlayerInit, spawn: Point, now: u64) -> Self {
        Self {
            id,
            name: init.name,
            color: init.color,
            collar: init.collar,
            hat: init.hat,
            x: init.x.unwrap_or(spawn.x),
            y: init.y.unwrap_or(spawn.y),
            facing: init.facing.unwrap_or(0.0),
            score: init.score.unwrap_or(0),
            last_update: now,
        }
    }

    pub fn apply_update(&mut self, update: PlayerUpdate, now: u64) {
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        if let Some(facing) = update.facing {
            self.facing = facing;
        }
        self.last_update = now;
    }
}

/// Collectible as shown to clients, with claim state flattened into nullable fields.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleView {
    pub id: CollectibleId,
    pub tags: Vec<String>,
    pub claimed_by: Option<ConnectionId>,
    pub claimed_at: Option<u64>,
    pub chew_duration_ms: Option<u64>,
    pub collected: bool,
    pub collected_by: Option<ConnectionId>,
    #[serde(flatten)]
    pub display: Map<String, Value>,
}

impl CollectibleView {
    pub fn is_available(&self) -> bool {
        !self.collected && self.claimed_by.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    Claimed,
    Collected,
    InProgress,
    PlayerMissing,
}

/// Events sent from a browser client to the server
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinWorld {
        world_name: String,
        player: PlayerInit,
        #[serde(default)]
        level_name: Option<String>,
    },
    UpdatePlayer(PlayerUpdate),
    #[serde(rename_all = "camelCase")]
    StartEating { collectible_id: CollectibleId },
    #[serde(rename_all = "camelCase")]
    CollectItem { collectible_id: CollectibleId },
}

impl ClientEvent {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Events sent from the server to clients
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Join snapshot. `self_id` is the receiving connection's own id.
    #[serde(rename_all = "camelCase")]
    WorldData {
        self_id: ConnectionId,
        players: Vec<PlayerState>,
        collectibles: Vec<CollectibleView>,
        level_name: String,
    },
    PlayerJoined(PlayerState),
    PlayerMoved(PlayerState),
    PlayerLeft {
        id: ConnectionId,
    },
    ChewStarted {
        id: CollectibleId,
        by: ConnectionId,
        duration: u64,
    },
    ChewCancelled {
        id: CollectibleId,
    },
    ChewRejected {
        id: CollectibleId,
        reason: RejectReason,
    },
    ItemCollected {
        id: CollectibleId,
        by: ConnectionId,
        score: i64,
        delta: i64,
    },
}

impl ServerEvent {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
