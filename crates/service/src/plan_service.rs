//! Plan association operations.
//!
//! Thin service wrapper over the plan store, providing the single entry
//! point for HTTP handlers. Every successful mutation broadcasts a
//! `plan_association_changed` event; reads broadcast nothing.

use tokio::sync::broadcast;

use pilot_mem_core::{PlanStatus, SessionPlan, WorkerError, WorkerEvent};
use pilot_mem_storage::Store;

use crate::{blocking, now_epoch_ms};

/// Service layer for session↔plan associations.
pub struct PlanService {
    store: Store,
    events: broadcast::Sender<WorkerEvent>,
}

impl PlanService {
    #[must_use]
    pub const fn new(store: Store, events: broadcast::Sender<WorkerEvent>) -> Self {
        Self { store, events }
    }

    /// Associates a session with a plan, replacing any prior association.
    pub async fn associate(
        &self,
        session_db_id: i64,
        plan_path: String,
        plan_status: Option<PlanStatus>,
    ) -> anyhow::Result<SessionPlan> {
        let store = self.store.clone();
        let status = plan_status.unwrap_or(PlanStatus::Pending);
        let plan = blocking(move || {
            store.upsert_plan_association(session_db_id, &plan_path, status, now_epoch_ms())
        })
        .await?;
        self.broadcast_change(session_db_id, Some(&plan));
        Ok(plan)
    }

    /// Associates through the externally supplied session id.
    ///
    /// # Errors
    /// Fails with [`WorkerError::NotFound`] when no session carries the
    /// content session id.
    pub async fn associate_by_content_id(
        &self,
        content_session_id: String,
        plan_path: String,
        plan_status: Option<PlanStatus>,
    ) -> anyhow::Result<SessionPlan> {
        let store = self.store.clone();
        let lookup_id = content_session_id.clone();
        let session = blocking(move || store.get_session_by_content_id(&lookup_id))
            .await?
            .ok_or_else(|| WorkerError::NotFound(format!("session '{content_session_id}'")))?;
        self.associate(session.id, plan_path, plan_status).await
    }

    pub async fn get(&self, session_db_id: i64) -> anyhow::Result<Option<SessionPlan>> {
        let store = self.store.clone();
        blocking(move || store.get_plan_for_session(session_db_id)).await
    }

    pub async fn get_by_content_id(
        &self,
        content_session_id: String,
    ) -> anyhow::Result<Option<SessionPlan>> {
        let store = self.store.clone();
        blocking(move || store.get_plan_by_content_session_id(&content_session_id)).await
    }

    /// Updates the status of an existing association.
    pub async fn update_status(
        &self,
        session_db_id: i64,
        plan_status: PlanStatus,
    ) -> anyhow::Result<SessionPlan> {
        let store = self.store.clone();
        let plan =
            blocking(move || store.update_plan_status(session_db_id, plan_status, now_epoch_ms()))
                .await?;
        self.broadcast_change(session_db_id, Some(&plan));
        Ok(plan)
    }

    /// Clears a session's association. Returns whether a row existed; the
    /// broadcast fires either way the clear succeeded.
    pub async fn clear(&self, session_db_id: i64) -> anyhow::Result<bool> {
        let store = self.store.clone();
        let existed = blocking(move || store.clear_plan_association(session_db_id)).await?;
        self.broadcast_change(session_db_id, None);
        Ok(existed)
    }

    fn broadcast_change(&self, session_db_id: i64, plan: Option<&SessionPlan>) {
        let _ = self.events.send(WorkerEvent::PlanAssociationChanged {
            session_db_id,
            plan_path: plan.map(|p| p.plan_path.clone()),
            plan_status: plan.map(|p| p.plan_status),
        });
    }
}
