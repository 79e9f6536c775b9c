//! Liveness, version, and restart handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::{AppState, WORKER_VERSION};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(rename = "queueDepth")]
    pub queue_depth: u64,
    #[serde(rename = "activeSessions")]
    pub active_sessions: usize,
    pub processing: bool,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RestartResponse {
    pub restarting: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetProcessingRequest {
    pub active: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: WORKER_VERSION,
        queue_depth: state.sessions.queue_depth().await,
        active_sessions: state.sessions.active_count(),
        processing: state.sessions.is_processing(),
    })
}

pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse { version: WORKER_VERSION })
}

/// Pauses or resumes queue processing and pushes the new snapshot to SSE
/// clients.
pub async fn set_processing(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetProcessingRequest>,
) -> Json<serde_json::Value> {
    state.sessions.set_processing(req.active);
    state.sessions.broadcast_processing_status().await;
    Json(serde_json::json!({"active": req.active}))
}

/// Graceful exit for wrapper-based restart: reply first, then exit cleanly
/// so the supervisor can respawn a fresh worker on the same port.
pub async fn restart(State(state): State<Arc<AppState>>) -> Json<RestartResponse> {
    tracing::info!("restart requested, shutting down");
    state.sessions.cancel_all();
    state.retention.stop();
    tokio::spawn(async {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        std::process::exit(0);
    });
    Json(RestartResponse { restarting: true })
}
