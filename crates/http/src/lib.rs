//! HTTP API server (Axum)
//!
//! Loopback surface for hooks (fast writers) and the dashboard (readers):
//! ingestion routes feed the pending queue, context injection renders
//! documents, plan routes manage associations, and `/stream` pushes events.

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use pilot_mem_context::ContextEngine;
use pilot_mem_core::{DaemonConfig, WorkerEvent};
use pilot_mem_service::{PlanService, RetentionScheduler, SessionManager};
use pilot_mem_storage::Store;

mod api_error;
pub mod handlers;
mod sse;
mod ui;

pub use api_error::ApiError;

/// Version string reported by `/api/version` and compared by the supervisor.
pub const WORKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared state threaded through every handler.
pub struct AppState {
    pub store: Store,
    pub config: DaemonConfig,
    pub events: broadcast::Sender<WorkerEvent>,
    pub sessions: Arc<SessionManager>,
    pub plans: PlanService,
    pub retention: Arc<RetentionScheduler>,
    pub context: Arc<ContextEngine>,
}

/// Builds the worker's router over shared state.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ui::serve_dashboard))
        .route("/health", get(handlers::admin::health))
        .route("/api/health", get(handlers::admin::health))
        .route("/api/version", get(handlers::admin::version))
        .route("/api/restart", post(handlers::admin::restart))
        .route("/api/processing", post(handlers::admin::set_processing))
        .route("/stream", get(sse::stream))
        .route("/api/projects", get(handlers::dashboard::projects))
        .route("/api/dashboard/sessions", get(handlers::dashboard::sessions))
        .route("/api/observations", get(handlers::dashboard::observations))
        .route("/api/summaries", get(handlers::dashboard::summaries))
        .route("/api/prompts", get(handlers::dashboard::prompts))
        .route(
            "/api/sessions/observations",
            post(handlers::observations::ingest_observation),
        )
        .route("/api/sessions/summarize", post(handlers::observations::ingest_summary))
        .route("/api/sessions/prompts", post(handlers::observations::ingest_prompt))
        .route("/api/context/inject", get(handlers::context::inject))
        .route("/api/plans", get(handlers::plans::list_plans))
        .route("/api/plans/active", get(handlers::plans::active_plan))
        .route(
            "/api/plan",
            get(handlers::plans::plan_info).delete(handlers::plans::delete_plan),
        )
        .route("/api/plan/content", get(handlers::plans::plan_content))
        .route(
            "/api/sessions/:id/plan",
            post(handlers::plans::associate)
                .get(handlers::plans::get_association)
                .delete(handlers::plans::clear_association),
        )
        .route("/api/sessions/:id/plan/status", put(handlers::plans::update_status))
        .route(
            "/api/sessions/by-content-id/:cid/plan",
            post(handlers::plans::associate_by_content_id)
                .get(handlers::plans::get_by_content_id)
                .delete(handlers::plans::clear_by_content_id),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
