//! Event-driven, cancellable iteration over a session's pending queue.
//!
//! Each active session owns one processor. The processor drains rows with
//! transactional claim-and-delete, then parks on the shared wakeup bus. The
//! bus is coarse: any enqueue for any session signals it, and each parked
//! processor performs its own probe. A wasted probe per unrelated session is
//! the price of a trivial event surface.

use std::time::Duration;

use async_stream::stream;
use futures_util::stream::Stream;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use pilot_mem_core::{CLAIM_ERROR_BACKOFF_MS, DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_MAX_BATCH_SIZE};
use pilot_mem_storage::{PendingRow, Store};

use crate::blocking;

/// Processor states. `Cancelled` and `IdleExit` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    /// Claiming rows.
    Draining,
    /// Waiting on the wakeup bus.
    Parked,
    /// Token cancelled; no further items.
    Cancelled,
    /// Idle wall-clock elapsed; processor evicted.
    IdleExit,
}

/// Events driving the processor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorEvent {
    /// A claim returned rows.
    Rows,
    /// The wakeup bus signalled.
    Notify,
    /// The cancellation token fired.
    Cancel,
    /// `now - last_activity` reached the idle timeout.
    IdleElapsed,
    /// A claim failed transiently.
    Error,
}

/// Pure transition function; the async loops below follow it.
#[must_use]
pub const fn transition(state: ProcessorState, event: ProcessorEvent) -> ProcessorState {
    match (state, event) {
        // Terminal states absorb everything.
        (ProcessorState::Cancelled, _) => ProcessorState::Cancelled,
        (ProcessorState::IdleExit, _) => ProcessorState::IdleExit,
        (_, ProcessorEvent::Cancel) => ProcessorState::Cancelled,
        (_, ProcessorEvent::IdleElapsed) => ProcessorState::IdleExit,
        (_, ProcessorEvent::Rows | ProcessorEvent::Notify) => ProcessorState::Draining,
        // A transient error backs off but keeps the current posture.
        (state, ProcessorEvent::Error) => state,
    }
}

/// Configuration for one session queue processor.
pub struct ProcessorConfig {
    /// Session whose queue this processor drains.
    pub session_db_id: i64,
    /// Cancellation token; observed before every claim and while parked.
    pub cancel: CancellationToken,
    /// Idle wall-clock before the processor exits. Reset on every yield.
    pub idle_timeout: Duration,
    /// Upper bound of one transactional batch claim.
    pub max_batch_size: usize,
    /// Invoked once when the idle timeout fires.
    pub on_idle_timeout: Option<Box<dyn FnOnce() + Send>>,
}

impl ProcessorConfig {
    /// Config with default idle timeout and batch size.
    #[must_use]
    pub fn new(session_db_id: i64, cancel: CancellationToken) -> Self {
        Self {
            session_db_id,
            cancel,
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            on_idle_timeout: None,
        }
    }
}

/// Lazy sequence of non-empty batches, up to `max_batch_size` each.
///
/// Loop contract: observe cancellation first; claim; yield rows and reset
/// the idle clock; otherwise park until a bus signal, cancellation, or the
/// idle deadline, whichever fires first. Transient claim errors log, back
/// off one second, and continue.
pub fn batch_stream(
    store: Store,
    mut config: ProcessorConfig,
    bus: &broadcast::Sender<()>,
) -> impl Stream<Item = Vec<PendingRow>> {
    let mut rx = bus.subscribe();
    stream! {
        let mut last_activity = Instant::now();
        loop {
            if config.cancel.is_cancelled() {
                return;
            }
            let claim = {
                let store = store.clone();
                let session = config.session_db_id;
                let limit = config.max_batch_size;
                blocking(move || store.claim_and_delete_batch(session, limit)).await
            };
            match claim {
                Ok(rows) if !rows.is_empty() => {
                    last_activity = Instant::now();
                    yield rows;
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        session = config.session_db_id,
                        "queue claim failed, backing off: {e}"
                    );
                    tokio::select! {
                        () = config.cancel.cancelled() => return,
                        () = tokio::time::sleep(
                            Duration::from_millis(CLAIM_ERROR_BACKOFF_MS)) => {}
                    }
                    continue;
                }
            }
            // Parked: wait for a wakeup, cancellation, or the idle deadline.
            let idle_deadline = last_activity + config.idle_timeout;
            tokio::select! {
                () = config.cancel.cancelled() => return,
                recv = rx.recv() => {
                    // Lagged still means "something was enqueued": probe.
                    if matches!(recv, Err(broadcast::error::RecvError::Closed)) {
                        return;
                    }
                }
                () = tokio::time::sleep_until(idle_deadline) => {
                    if let Some(on_idle) = config.on_idle_timeout.take() {
                        on_idle();
                    }
                    return;
                }
            }
        }
    }
}

/// Lazy sequence of single messages; same loop contract as
/// [`batch_stream`] with a claim of one.
pub fn single_stream(
    store: Store,
    config: ProcessorConfig,
    bus: &broadcast::Sender<()>,
) -> impl Stream<Item = PendingRow> {
    let mut config = config;
    config.max_batch_size = 1;
    let batches = batch_stream(store, config, bus);
    stream! {
        futures_util::pin_mut!(batches);
        while let Some(batch) = futures_util::StreamExt::next(&mut batches).await {
            for row in batch {
                yield row;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn transition_reaches_terminal(events: &[ProcessorEvent]) -> ProcessorState {
        events
            .iter()
            .fold(ProcessorState::Draining, |state, &event| transition(state, event))
    }

    #[test]
    fn cancel_is_terminal_from_any_state() {
        for state in [ProcessorState::Draining, ProcessorState::Parked] {
            assert_eq!(transition(state, ProcessorEvent::Cancel), ProcessorState::Cancelled);
        }
        assert_eq!(
            transition(ProcessorState::Cancelled, ProcessorEvent::Rows),
            ProcessorState::Cancelled
        );
    }

    #[test]
    fn notify_wakes_a_parked_processor() {
        assert_eq!(
            transition(ProcessorState::Parked, ProcessorEvent::Notify),
            ProcessorState::Draining
        );
    }

    #[test]
    fn error_keeps_the_current_posture() {
        assert_eq!(
            transition(ProcessorState::Draining, ProcessorEvent::Error),
            ProcessorState::Draining
        );
        assert_eq!(
            transition(ProcessorState::Parked, ProcessorEvent::Error),
            ProcessorState::Parked
        );
    }

    #[test]
    fn idle_elapsed_is_terminal() {
        let end = transition_reaches_terminal(&[
            ProcessorEvent::Rows,
            ProcessorEvent::Notify,
            ProcessorEvent::IdleElapsed,
            ProcessorEvent::Notify,
        ]);
        assert_eq!(end, ProcessorState::IdleExit);
    }

    fn store_with_session() -> (Store, i64, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        let session = store.create_session("content-42", "pilot", None, 1_000).unwrap();
        (store, session, dir)
    }

    fn payload(n: u32) -> String {
        serde_json::to_string(&pilot_mem_core::QueuePayload::new(
            pilot_mem_core::PayloadKind::Observation,
            serde_json::json!({"n": n}),
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn drains_in_batches_then_parks_until_cancelled() {
        let (store, session, _dir) = store_with_session();
        for n in 0..5 {
            store.enqueue(session, &payload(n), 1_000).unwrap();
        }
        let (bus, _keep) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        let mut config = ProcessorConfig::new(session, cancel.clone());
        config.max_batch_size = 2;

        let stream = batch_stream(store, config, &bus);
        futures_util::pin_mut!(stream);

        let sizes = [
            stream.next().await.unwrap().len(),
            stream.next().await.unwrap().len(),
            stream.next().await.unwrap().len(),
        ];
        assert_eq!(sizes, [2, 2, 1]);

        // Queue is empty: the processor parks. Cancelling ends the stream.
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn idle_timeout_fires_callback_and_ends_stream() {
        let (store, session, _dir) = store_with_session();
        let (bus, _keep) = broadcast::channel(16);
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = Arc::clone(&fired);
        let mut config = ProcessorConfig::new(session, CancellationToken::new());
        config.idle_timeout = Duration::from_millis(50);
        config.on_idle_timeout = Some(Box::new(move || {
            fired_clone.store(true, Ordering::SeqCst);
        }));

        let started = std::time::Instant::now();
        let stream = batch_stream(store, config, &bus);
        futures_util::pin_mut!(stream);
        assert!(stream.next().await.is_none());

        let elapsed = started.elapsed();
        assert!(fired.load(Ordering::SeqCst));
        assert!(elapsed >= Duration::from_millis(40), "returned too early: {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(500), "returned too late: {elapsed:?}");
    }

    #[tokio::test]
    async fn bus_signal_wakes_a_parked_processor() {
        let (store, session, _dir) = store_with_session();
        let (bus, _keep) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        let config = ProcessorConfig::new(session, cancel.clone());

        let stream = batch_stream(store.clone(), config, &bus);
        futures_util::pin_mut!(stream);

        // Nothing queued yet; enqueue from a delayed task, then signal.
        let enqueue_store = store.clone();
        let bus_tx = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            enqueue_store.enqueue(session, &payload(7), 2_000).unwrap();
            let _ = bus_tx.send(());
        });

        let batch = stream.next().await.unwrap();
        assert_eq!(batch.len(), 1);
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn single_stream_preserves_enqueue_order() {
        let (store, session, _dir) = store_with_session();
        for n in 0..4 {
            store.enqueue(session, &payload(n), 1_000).unwrap();
        }
        let (bus, _keep) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        let config = ProcessorConfig::new(session, cancel.clone());

        let stream = single_stream(store, config, &bus);
        futures_util::pin_mut!(stream);
        for n in 0..4 {
            let row = stream.next().await.unwrap();
            let msg = row.to_pending_message().unwrap();
            assert_eq!(msg.payload.body["n"], n);
        }
        cancel.cancel();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_token_yields_nothing() {
        let (store, session, _dir) = store_with_session();
        store.enqueue(session, &payload(1), 1_000).unwrap();
        let (bus, _keep) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let config = ProcessorConfig::new(session, cancel);

        let stream = batch_stream(store.clone(), config, &bus);
        futures_util::pin_mut!(stream);
        assert!(stream.next().await.is_none());
        // The row is still there: a cancelled processor claims nothing.
        assert_eq!(store.pending_count_for_session(session).unwrap(), 1);
    }
}
