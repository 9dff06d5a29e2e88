//! # Pet World Server Library
//!
//! Authoritative world-state server for the multiplayer pet world. Browser
//! clients join a shared, named world over a WebSocket, walk their avatar
//! around, and race each other to chew collectibles for points. This crate
//! owns every world's player and collectible state, arbitrates competing
//! claims, and keeps all connected clients consistent through event
//! broadcast.
//!
//! ## Core Responsibilities
//!
//! ### World Lifecycle
//! Worlds exist only while someone is in them. The [`registry`] creates a
//! world from its level on the first join and destroys it, together with any
//! pending timers, when the last player leaves. Nothing is persisted.
//!
//! ### Movement
//! Position updates are trusted: the last update from a client wins, with no
//! server-side physics or validation. Each update is relayed to every other
//! member of the world.
//!
//! ### Claiming Collectibles
//! A collectible is a contested resource. A claim either finalizes on the
//! spot (legacy instant pickup) or after a chew duration taken from the
//! collectible's `chew:<speed>` tag. Only one connection can hold a claim at
//! a time; losers are told why, and claims held by a disconnecting player are
//! released and announced.
//!
//! ## Concurrency Model
//!
//! Each connection runs in its own task. All tasks touching the same world
//! serialize on that world's single mutex; different worlds never contend.
//! Core operations are synchronous and never await while holding a lock. The
//! only deferred work is the chew timer, a tokio task that re-acquires the
//! world's lock when it fires and is aborted whenever its claim is superseded
//! or its world is destroyed.
//!
//! ## Module Organization
//!
//! - [`level_store`]: loads and caches level definitions by name
//! - [`world`]: player table, claim state machine and movement protocol
//! - [`timers`]: cancellable per-collectible chew timers
//! - [`registry`]: world name to world mapping and lifecycle
//! - [`broadcast`]: group delivery to the sessions of one world
//! - [`session`]: one connection's binding to a world
//! - [`network`]: axum HTTP and WebSocket front end
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new(ServerConfig::default());
//!     server
//!         .run(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod error;
pub mod level_store;
pub mod network;
pub mod registry;
pub mod session;
pub mod timers;
pub mod utils;
pub mod world;
