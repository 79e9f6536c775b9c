//! Context injection route.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use serde::Deserialize;

use pilot_mem_context::{ContextRequest, RenderMode};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ContextInjectQuery {
    /// Comma-separated project list.
    pub projects: Option<String>,
    /// Single project; used when `projects` is absent.
    pub project: Option<String>,
    #[serde(rename = "planPath")]
    pub plan_path: Option<String>,
    /// `"true"` enables ANSI output.
    pub colors: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    pub cwd: Option<String>,
}

impl ContextInjectQuery {
    fn project_list(&self) -> Vec<String> {
        self.projects
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .filter(|list: &Vec<String>| !list.is_empty())
            .or_else(|| self.project.clone().map(|p| vec![p]))
            .unwrap_or_default()
    }
}

/// Renders the context document as `text/plain`, possibly empty.
pub async fn inject(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ContextInjectQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let projects = query.project_list();
    if projects.is_empty() {
        return Err(ApiError::BadRequest("projects or project query parameter required".into()));
    }

    let request = ContextRequest {
        projects,
        current_session_id: query.session_id,
        current_cwd: query.cwd,
        plan_path: query.plan_path.filter(|p| !p.is_empty()),
        render_mode: if query.colors.as_deref() == Some("true") {
            RenderMode::Ansi
        } else {
            RenderMode::Markdown
        },
    };

    let engine = Arc::clone(&state.context);
    let body = tokio::task::spawn_blocking(move || engine.compose(&request))
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("spawn_blocking join error: {e}")))?
        .map_err(ApiError::from)?;

    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body))
}
