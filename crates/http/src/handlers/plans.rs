//! Plan discovery, plan file reads, and association CRUD.
//!
//! Every file-reading route resolves the requested path against the project
//! root and rejects anything that is not a `.md` descendant of
//! `<projectRoot>/docs/plans/` with 403.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Path as RoutePath, Query, State};
use axum::Json;
use serde::Deserialize;

use pilot_mem_core::{
    parse_plan_file, resolve_plan_path, PlanAssociationRequest, PlanFileInfo, PlanStatus,
    PlanStatusRequest, SessionPlan,
};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct PlanRootQuery {
    /// Project root; defaults to the daemon's working directory.
    pub root: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PlanPathQuery {
    pub path: String,
    pub root: Option<String>,
}

fn project_root(root: Option<&str>) -> PathBuf {
    root.map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Applies the path-traversal rule shared by every file-reading plan route.
fn guarded_path(root: &Path, requested: &str) -> Result<PathBuf, ApiError> {
    resolve_plan_path(root, requested).ok_or_else(|| {
        ApiError::Forbidden(format!(
            "plan path must be a .md file under docs/plans/: {requested}"
        ))
    })
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

pub async fn list_plans(
    Query(query): Query<PlanRootQuery>,
) -> Result<Json<Vec<PlanFileInfo>>, ApiError> {
    let plans_dir = project_root(query.root.as_deref()).join("docs").join("plans");
    let plans = blocking(move || {
        let mut plans = Vec::new();
        let entries = match std::fs::read_dir(&plans_dir) {
            Ok(entries) => entries,
            // No plans directory yet is an empty list, not an error.
            Err(_) => return Ok(plans),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "md") {
                continue;
            }
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    plans.push(parse_plan_file(&path.to_string_lossy(), &content));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "unreadable plan file: {e}");
                }
            }
        }
        plans.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(plans)
    })
    .await?;
    Ok(Json(plans))
}

/// Reads `active_plan.json` for the hosting editor session. Missing file or
/// malformed JSON both yield an empty object; hooks tolerate either.
pub async fn active_plan(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(path) = state.config.active_plan_path() else {
        return Ok(Json(serde_json::json!({})));
    };
    let value = blocking(move || {
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Ok(serde_json::json!({})),
        };
        Ok(serde_json::from_str(&content).unwrap_or_else(|_| serde_json::json!({})))
    })
    .await?;
    Ok(Json(value))
}

pub async fn plan_info(
    Query(query): Query<PlanPathQuery>,
) -> Result<Json<PlanFileInfo>, ApiError> {
    let root = project_root(query.root.as_deref());
    let path = guarded_path(&root, &query.path)?;
    let requested = query.path.clone();
    let info = blocking(move || {
        let content = std::fs::read_to_string(&path)
            .map_err(|_| pilot_mem_core::WorkerError::NotFound(format!("plan '{requested}'")))?;
        Ok(parse_plan_file(&requested, &content))
    })
    .await?;
    Ok(Json(info))
}

pub async fn plan_content(Query(query): Query<PlanPathQuery>) -> Result<String, ApiError> {
    let root = project_root(query.root.as_deref());
    let path = guarded_path(&root, &query.path)?;
    let requested = query.path.clone();
    blocking(move || {
        std::fs::read_to_string(&path)
            .map_err(|_| pilot_mem_core::WorkerError::NotFound(format!("plan '{requested}'")).into())
    })
    .await
}

pub async fn delete_plan(
    Query(query): Query<PlanPathQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let root = project_root(query.root.as_deref());
    let path = guarded_path(&root, &query.path)?;
    let requested = query.path.clone();
    blocking(move || {
        std::fs::remove_file(&path)
            .map_err(|_| pilot_mem_core::WorkerError::NotFound(format!("plan '{requested}'")))?;
        Ok(())
    })
    .await?;
    Ok(Json(serde_json::json!({"deleted": true})))
}

fn parse_status(raw: &str) -> Result<PlanStatus, ApiError> {
    raw.parse::<PlanStatus>().map_err(ApiError::from)
}

pub async fn associate(
    State(state): State<Arc<AppState>>,
    RoutePath(session_db_id): RoutePath<i64>,
    Json(req): Json<PlanAssociationRequest>,
) -> Result<Json<SessionPlan>, ApiError> {
    let status = req.plan_status.as_deref().map(parse_status).transpose()?;
    let plan = state
        .plans
        .associate(session_db_id, req.plan_path, status)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(plan))
}

pub async fn get_association(
    State(state): State<Arc<AppState>>,
    RoutePath(session_db_id): RoutePath<i64>,
) -> Result<Json<Option<SessionPlan>>, ApiError> {
    let plan = state.plans.get(session_db_id).await.map_err(ApiError::from)?;
    Ok(Json(plan))
}

pub async fn clear_association(
    State(state): State<Arc<AppState>>,
    RoutePath(session_db_id): RoutePath<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let existed = state.plans.clear(session_db_id).await.map_err(ApiError::from)?;
    Ok(Json(serde_json::json!({"cleared": existed})))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    RoutePath(session_db_id): RoutePath<i64>,
    Json(req): Json<PlanStatusRequest>,
) -> Result<Json<SessionPlan>, ApiError> {
    let status = parse_status(&req.plan_status)?;
    let plan = state
        .plans
        .update_status(session_db_id, status)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(plan))
}

pub async fn associate_by_content_id(
    State(state): State<Arc<AppState>>,
    RoutePath(content_session_id): RoutePath<String>,
    Json(req): Json<PlanAssociationRequest>,
) -> Result<Json<SessionPlan>, ApiError> {
    let status = req.plan_status.as_deref().map(parse_status).transpose()?;
    let plan = state
        .plans
        .associate_by_content_id(content_session_id, req.plan_path, status)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(plan))
}

pub async fn get_by_content_id(
    State(state): State<Arc<AppState>>,
    RoutePath(content_session_id): RoutePath<String>,
) -> Result<Json<Option<SessionPlan>>, ApiError> {
    let plan = state
        .plans
        .get_by_content_id(content_session_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(plan))
}

pub async fn clear_by_content_id(
    State(state): State<Arc<AppState>>,
    RoutePath(content_session_id): RoutePath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let existing = state
        .plans
        .get_by_content_id(content_session_id)
        .await
        .map_err(ApiError::from)?;
    let Some(plan) = existing else {
        return Ok(Json(serde_json::json!({"cleared": false})));
    };
    let existed = state.plans.clear(plan.session_db_id).await.map_err(ApiError::from)?;
    Ok(Json(serde_json::json!({"cleared": existed})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_rejects_traversal_with_forbidden() {
        let root = Path::new("/repo");
        let err = guarded_path(root, "docs/plans/../../secrets.md").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        let err = guarded_path(root, "/etc/passwd").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn guard_rejects_non_markdown() {
        let root = Path::new("/repo");
        let err = guarded_path(root, "docs/plans/notes.txt").unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn guard_accepts_plan_markdown() {
        let root = Path::new("/repo");
        let path = guarded_path(root, "docs/plans/my-plan.md").unwrap();
        assert_eq!(path, Path::new("/repo/docs/plans/my-plan.md"));
    }

    #[test]
    fn invalid_plan_status_is_bad_request() {
        let err = parse_status("DONE").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
