//! Worker daemon entry point: wires the store, services, and HTTP surface.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::sync::broadcast;

use pilot_mem_context::{ContextConfig, ContextEngine};
use pilot_mem_core::DaemonConfig;
use pilot_mem_http::{create_router, AppState, WORKER_VERSION};
use pilot_mem_service::{PlanService, RetentionScheduler, SessionManager};
use pilot_mem_storage::{RetentionPolicy, Store};

pub(crate) async fn run(config: DaemonConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;
    let store = Store::open(&config.db_path())
        .with_context(|| format!("opening database {}", config.db_path().display()))?;

    // Initial receivers dropped - subscribers use .subscribe()
    let (events, _initial_events_rx) = broadcast::channel(256);
    let (bus, _initial_bus_rx) = broadcast::channel(256);

    let sessions = SessionManager::new(store.clone(), bus, events.clone());
    let plans = PlanService::new(store.clone(), events.clone());
    let retention = Arc::new(RetentionScheduler::new());
    retention.start(store.clone(), RetentionPolicy::default());
    let context = Arc::new(ContextEngine::new(store.clone(), ContextConfig::default()));

    // Startup recovery: rows left from a previous run drain as soon as
    // their sessions see new activity; log what survived the restart.
    match store.pending_total() {
        Ok(depth) if depth > 0 => {
            tracing::info!(depth, "pending rows survived restart");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("startup queue inspection failed: {e}"),
    }

    let state = Arc::new(AppState {
        store,
        config: config.clone(),
        events,
        sessions,
        plans,
        retention: Arc::clone(&retention),
        context,
    });

    let router = create_router(state);
    let addr = format!("{}:{}", config.bind, config.port);
    tracing::info!(version = WORKER_VERSION, "starting worker on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, router).await?;

    retention.stop();
    Ok(())
}
