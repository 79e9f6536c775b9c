//! Background services of the worker daemon: per-session queue processors,
//! the active-session registry, retention, and plan association.

mod ingest;
mod plan_service;
mod queue_processor;
mod retention_scheduler;
mod session_manager;

pub use ingest::materialize;
pub use plan_service::PlanService;
pub use queue_processor::{
    batch_stream, single_stream, transition, ProcessorConfig, ProcessorEvent, ProcessorState,
};
pub use retention_scheduler::RetentionScheduler;
pub use session_manager::SessionManager;

/// Helper: run a blocking closure on the tokio blocking pool.
pub(crate) async fn blocking<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow::anyhow!("spawn_blocking join error: {e}"))?
}

pub(crate) fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
