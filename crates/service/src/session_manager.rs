//! Active-session registry.
//!
//! Each session with queued work gets one processor task, spawned lazily on
//! the first enqueue and evicted after the idle timeout. The registry also
//! answers the health endpoint's aggregate queue depth and the SSE
//! `processing_status` snapshot.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use pilot_mem_core::{WorkerEvent, DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_MAX_BATCH_SIZE};
use pilot_mem_storage::Store;

use crate::queue_processor::{batch_stream, ProcessorConfig};
use crate::{blocking, ingest};

struct SessionHandle {
    cancel: CancellationToken,
}

/// Registry of running session queue processors.
pub struct SessionManager {
    store: Store,
    bus: broadcast::Sender<()>,
    events: broadcast::Sender<WorkerEvent>,
    active: Mutex<HashMap<i64, SessionHandle>>,
    processing: AtomicBool,
    idle_timeout: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(
        store: Store,
        bus: broadcast::Sender<()>,
        events: broadcast::Sender<WorkerEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            bus,
            events,
            active: Mutex::new(HashMap::new()),
            processing: AtomicBool::new(true),
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
        })
    }

    /// Signals the shared wakeup bus after an enqueue. Never blocks; a send
    /// with no parked receiver is fine.
    pub fn notify_enqueued(&self) {
        let _ = self.bus.send(());
    }

    /// Ensures a processor task is running for the session.
    pub fn ensure_processor(self: &Arc<Self>, session_db_id: i64) {
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if active.contains_key(&session_db_id) {
            return;
        }
        let cancel = CancellationToken::new();
        active.insert(session_db_id, SessionHandle { cancel: cancel.clone() });
        drop(active);

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_processor(session_db_id, cancel).await;
            manager.evict(session_db_id);
        });
        tracing::debug!(session = session_db_id, "session processor started");
    }

    async fn run_processor(&self, session_db_id: i64, cancel: CancellationToken) {
        let mut config = ProcessorConfig::new(session_db_id, cancel);
        config.idle_timeout = self.idle_timeout;
        config.max_batch_size = DEFAULT_MAX_BATCH_SIZE;
        config.on_idle_timeout = Some(Box::new(move || {
            tracing::debug!(session = session_db_id, "session processor idle, evicting");
        }));

        let stream = batch_stream(self.store.clone(), config, &self.bus);
        futures_util::pin_mut!(stream);
        while let Some(batch) = stream.next().await {
            if !self.processing.load(Ordering::SeqCst) {
                // Paused: rows were claimed, still materialize them. A
                // claimed row has already left the durable queue.
                tracing::debug!("processing paused, handling in-flight batch anyway");
            }
            for row in batch {
                let store = self.store.clone();
                let events = self.events.clone();
                let result =
                    blocking(move || Ok(ingest::materialize(&store, &events, &row))).await;
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) if matches!(e, pilot_mem_core::WorkerError::Corruption(_)) => {
                        tracing::warn!(session = session_db_id, "skipping corrupt message: {e}");
                    }
                    Ok(Err(e)) => {
                        tracing::error!(session = session_db_id, "message processing failed: {e}");
                    }
                    Err(e) => {
                        tracing::error!(session = session_db_id, "processor join error: {e}");
                    }
                }
            }
            self.broadcast_processing_status().await;
        }
    }

    fn evict(&self, session_db_id: i64) {
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.remove(&session_db_id);
    }

    /// Cancels every running processor; used on shutdown.
    pub fn cancel_all(&self) {
        let active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for handle in active.values() {
            handle.cancel.cancel();
        }
    }

    /// Number of sessions with a live processor.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.lock().map(|a| a.len()).unwrap_or(0)
    }

    /// Whether queue processing is currently enabled.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Enables or disables queue processing. Disabling cancels running
    /// processors; queued rows stay durable until processing resumes.
    pub fn set_processing(&self, active: bool) {
        self.processing.store(active, Ordering::SeqCst);
        if !active {
            self.cancel_all();
        }
    }

    /// Aggregate queue depth across all sessions.
    pub async fn queue_depth(&self) -> u64 {
        let store = self.store.clone();
        blocking(move || store.pending_total()).await.unwrap_or(0)
    }

    /// Emits the current `processing_status` snapshot to SSE clients.
    pub async fn broadcast_processing_status(&self) {
        let event = WorkerEvent::ProcessingStatus {
            active: self.is_processing(),
            queue_depth: self.queue_depth().await,
        };
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_mem_core::{PayloadKind, QueuePayload};
    use tempfile::TempDir;

    fn manager() -> (Arc<SessionManager>, Store, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        let (bus, _keep_bus) = broadcast::channel(64);
        let (events, _keep_events) = broadcast::channel(64);
        (SessionManager::new(store.clone(), bus, events), store, dir)
    }

    fn observation_payload(session: &str) -> String {
        serde_json::to_string(&QueuePayload::new(
            PayloadKind::Observation,
            serde_json::json!({
                "memory_session_id": session,
                "project": "pilot",
                "tool_name": "Read",
                "tool_input": {"file_path": "src/lib.rs"},
                "tool_response": "fn lib() {}",
                "cwd": "/x/pilot",
            }),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn ensure_processor_is_idempotent() {
        let (manager, store, _dir) = manager();
        let session = store.create_session("content-1", "pilot", None, 1_000).unwrap();

        manager.ensure_processor(session);
        manager.ensure_processor(session);

        assert_eq!(manager.active_count(), 1);
        manager.cancel_all();
    }

    #[tokio::test]
    async fn enqueued_work_is_materialized() {
        let (manager, store, _dir) = manager();
        let session = store.create_session("content-1", "pilot", None, 1_000).unwrap();
        store.enqueue(session, &observation_payload("content-1"), 1_000).unwrap();
        manager.ensure_processor(session);
        manager.notify_enqueued();

        // Wait for the processor to drain the row.
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if store.pending_total().unwrap() == 0 {
                break;
            }
        }

        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !store.query_observations("pilot", &[], &[], 10).unwrap().is_empty() {
                break;
            }
        }
        let observations = store.query_observations("pilot", &[], &[], 10).unwrap();
        assert_eq!(observations.len(), 1);
        manager.cancel_all();
    }

    #[tokio::test]
    async fn queue_depth_aggregates_sessions() {
        let (manager, store, _dir) = manager();
        let s1 = store.create_session("content-1", "pilot", None, 1_000).unwrap();
        let s2 = store.create_session("content-2", "pilot", None, 1_000).unwrap();
        store.enqueue(s1, &observation_payload("content-1"), 1_000).unwrap();
        store.enqueue(s2, &observation_payload("content-2"), 1_000).unwrap();

        assert_eq!(manager.queue_depth().await, 2);
    }

    #[tokio::test]
    async fn processing_flag_round_trips() {
        let (manager, _store, _dir) = manager();
        assert!(manager.is_processing());
        manager.set_processing(false);
        assert!(!manager.is_processing());
    }
}
