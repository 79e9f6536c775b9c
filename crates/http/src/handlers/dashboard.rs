//! Dashboard read routes.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use pilot_mem_core::{Observation, SessionSummary, UserPrompt};
use pilot_mem_storage::{DashboardSession, Page};

use crate::{ApiError, AppState};

const fn default_limit() -> usize {
    20
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default)]
    pub offset: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub project: Option<String>,
}

impl PaginationQuery {
    fn capped_limit(&self) -> usize {
        self.limit.min(100)
    }
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

pub async fn sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DashboardSession>>, ApiError> {
    let store = state.store.clone();
    let rows = blocking(move || store.get_dashboard_sessions()).await?;
    Ok(Json(rows))
}

pub async fn projects(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let store = state.store.clone();
    let rows = blocking(move || store.get_all_projects()).await?;
    Ok(Json(rows))
}

pub async fn observations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<Observation>>, ApiError> {
    let store = state.store.clone();
    let limit = query.capped_limit();
    let page = blocking(move || {
        store.get_observations_paginated(query.offset, limit, query.project.as_deref())
    })
    .await?;
    Ok(Json(page))
}

pub async fn summaries(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<SessionSummary>>, ApiError> {
    let store = state.store.clone();
    let limit = query.capped_limit();
    let page = blocking(move || {
        store.get_summaries_paginated(query.offset, limit, query.project.as_deref())
    })
    .await?;
    Ok(Json(page))
}

pub async fn prompts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<UserPrompt>>, ApiError> {
    let store = state.store.clone();
    let limit = query.capped_limit();
    let page = blocking(move || {
        store.get_prompts_paginated(query.offset, limit, query.project.as_deref())
    })
    .await?;
    Ok(Json(page))
}
