//! Ingestion routes: observations, summaries, prompts.
//!
//! Writers must be fast: validate, resolve the session, persist the queue
//! row, signal the bus, and acknowledge. Materialization happens in the
//! session's queue processor, not here. The durable row is written before
//! the HTTP write is acknowledged, so a crashed processor only loses work
//! the hook will re-send.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;

use pilot_mem_core::{
    project_from_cwd, ObservationIngest, PayloadKind, PromptIngest, QueuePayload, SummarizeIngest,
    WorkerError,
};

use crate::{ApiError, AppState};

fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {e}")))?
        .map_err(ApiError::from)
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(WorkerError::ContractViolation(format!("missing required field: {field}"))
            .into());
    }
    Ok(())
}

/// Resolves (or creates) the session and enqueues one payload.
async fn enqueue_for_session(
    state: &Arc<AppState>,
    content_session_id: String,
    project: String,
    initial_prompt: Option<String>,
    payload: QueuePayload,
) -> Result<(), ApiError> {
    let store = state.store.clone();
    let session_db_id = blocking(move || {
        store.create_session(
            &content_session_id,
            &project,
            initial_prompt.as_deref(),
            now_epoch_ms(),
        )
    })
    .await?;

    let store = state.store.clone();
    let raw = serde_json::to_string(&payload)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("payload encode: {e}")))?;
    blocking(move || store.enqueue(session_db_id, &raw, now_epoch_ms())).await?;

    state.sessions.ensure_processor(session_db_id);
    state.sessions.notify_enqueued();
    Ok(())
}

pub async fn ingest_observation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ObservationIngest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require("contentSessionId", &req.content_session_id)?;
    require("tool_name", &req.tool_name)?;

    let project = project_from_cwd(&req.cwd);
    if state.config.exclude_projects.is_excluded(&project) {
        tracing::debug!(project, "project excluded, dropping observation");
        return Ok(Json(serde_json::json!({})));
    }

    // Honor an editor re-key before the payload is queued.
    let memory_session_id = match req.memory_session_id.clone() {
        Some(new_id) => {
            let store = state.store.clone();
            let content_id = req.content_session_id.clone();
            let remap_id = new_id.clone();
            blocking(move || {
                if let Some(session) = store.get_session_by_content_id(&content_id)? {
                    store.update_memory_session_id(session.id, &remap_id)?;
                }
                Ok(())
            })
            .await?;
            new_id
        }
        None => {
            let store = state.store.clone();
            let content_id = req.content_session_id.clone();
            blocking(move || Ok(store.get_session_by_content_id(&content_id)?))
                .await?
                .map_or_else(|| req.content_session_id.clone(), |s| s.memory_session_id)
        }
    };

    let payload = QueuePayload::new(
        PayloadKind::Observation,
        serde_json::json!({
            "memory_session_id": memory_session_id,
            "project": project.clone(),
            "tool_name": req.tool_name,
            "tool_input": req.tool_input,
            "tool_response": req.tool_response,
            "cwd": req.cwd,
        }),
    );
    enqueue_for_session(&state, req.content_session_id, project, None, payload).await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn ingest_summary(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SummarizeIngest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require("contentSessionId", &req.content_session_id)?;

    let project = req.cwd.as_deref().map(project_from_cwd).unwrap_or_else(|| "unknown".to_owned());
    let store = state.store.clone();
    let content_id = req.content_session_id.clone();
    let session = blocking(move || Ok(store.get_session_by_content_id(&content_id)?)).await?;
    let (memory_session_id, project) = match session {
        Some(s) => (s.memory_session_id, s.project),
        None => (req.content_session_id.clone(), project),
    };

    let payload = QueuePayload::new(
        PayloadKind::Summary,
        serde_json::json!({
            "memory_session_id": memory_session_id,
            "project": project.clone(),
            "last_assistant_message": req.last_assistant_message,
        }),
    );
    enqueue_for_session(&state, req.content_session_id, project, None, payload).await?;
    Ok(Json(serde_json::json!({})))
}

pub async fn ingest_prompt(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PromptIngest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require("contentSessionId", &req.content_session_id)?;
    require("prompt", &req.prompt)?;

    let project = req.cwd.as_deref().map(project_from_cwd).unwrap_or_else(|| "unknown".to_owned());
    let payload = QueuePayload::new(
        PayloadKind::Prompt,
        serde_json::json!({
            "content_session_id": req.content_session_id.clone(),
            "project": project.clone(),
            "prompt": req.prompt,
        }),
    );
    // The prompt itself flows through the queue; `create_session` gets no
    // initial prompt here or the first one would be recorded twice.
    enqueue_for_session(&state, req.content_session_id, project, None, payload).await?;
    Ok(Json(serde_json::json!({})))
}
