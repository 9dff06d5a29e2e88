//! Error types for level loading and the network front end.
//!
//! Game-level conditions (a rejected claim, an event for a player that already
//! left) are not errors; they are modelled as outcomes in [`crate::world`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level `{0}` not found")]
    NotFound(String),
    #[error("invalid level name `{0}`")]
    InvalidName(String),
    #[error("level `{name}` is malformed: {source}")]
    InvalidFormat {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read level `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("level loader task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server stopped unexpectedly: {0}")]
    Serve(#[source] std::io::Error),
}
