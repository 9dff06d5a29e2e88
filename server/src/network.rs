//! HTTP and WebSocket front end
//!
//! Serves the read-only level endpoint and upgrades `/ws` connections into
//! [`Session`]s. Each socket gets two halves: a reader that decodes client
//! events and applies them to the session, and a writer task that drains the
//! session's outbound queue onto the socket.

use crate::config::ServerConfig;
use crate::error::{LevelError, ServerError};
use crate::level_store::LevelStore;
use crate::registry::Registry;
use crate::session::Session;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde_json::json;
use shared::{ClientEvent, ConnectionId, ServerEvent};
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub levels: Arc<LevelStore>,
    next_connection_id: Arc<AtomicU32>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        let levels = Arc::new(LevelStore::new(config.levels_dir.clone()));
        let registry = Arc::new(Registry::new(Arc::clone(&levels), &config.default_level));
        Self {
            registry,
            levels,
            next_connection_id: Arc::new(AtomicU32::new(1)),
        }
    }

    fn assign_connection_id(&self) -> ConnectionId {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/levels/{name}", get(level_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// The world server: binds, serves, and stops when `shutdown` resolves
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let state = AppState::new(&config);
        Self { config, state }
    }

    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.clone(),
                source,
            })?;

        info!(
            "Pet world server listening on http://{} (levels from {})",
            addr,
            self.state.levels.dir().display()
        );

        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)?;

        info!("Server shut down");
        Ok(())
    }
}

async fn level_handler(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let name = name.strip_suffix(".json").unwrap_or(&name);
    match state.levels.read_raw(name).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            match &e {
                LevelError::NotFound(_) => debug!("Level request failed: {}", e),
                _ => warn!("Level request failed: {}", e),
            }
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Level not found" })),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "worlds": state.registry.world_count(),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = state.assign_connection_id();
    info!("Client {} connected", id);

    let (mut sink, mut stream) = socket.split();
    let (outbox, mut inbox) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode event for client {}: {}", id, e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(text.into())).await {
                debug!("Writer for client {} stopped: {}", id, e);
                break;
            }
        }
    });

    let mut session = Session::new(id, Arc::clone(&state.registry), outbox);

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientEvent::from_json(text.as_str()) {
                Ok(event) => {
                    warm_level(&state, &event).await;
                    session.handle(event)
                }
                Err(e) => warn!("Ignoring malformed frame from client {}: {}", id, e),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Client {} transport error: {}", id, e);
                break;
            }
        }
    }

    // Leaving happens here, before the writer goes away
    drop(session);
    writer.abort();
    info!("Client {} disconnected", id);
}

/// Loads the level of a world about to be created on the blocking pool, so
/// the join that follows finds it cached.
async fn warm_level(state: &AppState, event: &ClientEvent) {
    let ClientEvent::JoinWorld {
        world_name,
        level_name,
        ..
    } = event
    else {
        return;
    };
    if state.registry.get(world_name).is_some() {
        return;
    }
    let name = level_name
        .as_deref()
        .unwrap_or(state.registry.default_level());
    if let Err(e) = state.levels.warm(name).await {
        debug!("Could not preload level '{}': {}", name, e);
    }
}
