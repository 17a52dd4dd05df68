use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router, http::StatusCode};
use futures_util::SinkExt;
use protocol::SessionConfig;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::registry::SessionRegistry;
use crate::session::{EndReason, Phase};
use crate::storage::StorageSink;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub config: Arc<BridgeConfig>,
    pub storage: Option<Arc<dyn StorageSink>>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/media-stream", get(media_stream_handler))
        .route("/events/:call_sid", get(events_handler))
        .route("/session/config", post(session_config_handler))
        .route("/healthz", get(healthz))
        .route("/status", get(status))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "OK"
}

#[derive(Serialize)]
struct StatusResponse {
    registry_size: usize,
    active_sessions: usize,
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let call_ids = state.registry.call_ids();
    let active_sessions = call_ids
        .iter()
        .filter_map(|id| state.registry.get(id))
        .filter(|session| session.phase() != Phase::Ended)
        .count();
    Json(StatusResponse {
        registry_size: state.registry.len(),
        active_sessions,
    })
}

async fn session_config_handler(
    State(state): State<AppState>,
    Json(request): Json<SessionConfigRequest>,
) -> impl IntoResponse {
    if let Err(err) = request.config.validate() {
        return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
    }
    match state.registry.get(&request.call_sid) {
        Some(session) if session.phase() == Phase::Initializing => {
            session.begin_configuring(request.config);
            StatusCode::ACCEPTED.into_response()
        }
        Some(_) => {
            // Permitted only before Configuring -> Ready completes; ignored otherwise.
            StatusCode::CONFLICT.into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(serde::Deserialize)]
struct SessionConfigRequest {
    call_sid: String,
    config: SessionConfig,
}

async fn events_handler(
    Path(call_sid): Path<String>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| observe_events(socket, call_sid, state))
}

async fn observe_events(mut socket: WebSocket, call_sid: String, state: AppState) {
    let Some(session) = state.registry.get(&call_sid) else {
        let _ = socket
            .send(Message::Close(None))
            .await;
        return;
    };
    let mut receiver = session.observers().attach();
    while let Some(event) = receiver.recv().await {
        let Ok(text) = serde_json::to_string(&event) else {
            continue;
        };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

async fn media_stream_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| crate::bridge_loop::run_call(socket, state))
}

pub async fn shutdown_all(registry: &SessionRegistry, bound: Duration) {
    let deadline = tokio::time::Instant::now() + bound;
    for call_id in registry.call_ids() {
        if let Some(session) = registry.get(&call_id) {
            if tokio::time::timeout_at(deadline, session.end(EndReason::ExplicitEndRequest))
                .await
                .is_err()
            {
                warn!(call_id, "session did not terminate within shutdown bound");
            }
            registry.remove(&call_id);
        }
    }
    info!("all sessions released, shutting down");
}

