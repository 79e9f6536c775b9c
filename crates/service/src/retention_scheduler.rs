//! Periodic retention pruning.
//!
//! One task per scheduler: sleeps through the startup delay, then prunes on
//! a fixed cadence. `start` is idempotent: a second call cancels the timers
//! the first one scheduled. Run errors are logged; the cadence continues.

use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use pilot_mem_core::{RETENTION_INTERVAL_HOURS, RETENTION_STARTUP_DELAY_SECS};
use pilot_mem_storage::{RetentionPolicy, Store};

use crate::{blocking, now_epoch_ms};

struct Timers {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Schedules retention runs against a store.
pub struct RetentionScheduler {
    timers: Mutex<Option<Timers>>,
    startup_delay: Duration,
    interval: Duration,
}

impl Default for RetentionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RetentionScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            timers: Mutex::new(None),
            startup_delay: Duration::from_secs(RETENTION_STARTUP_DELAY_SECS),
            interval: Duration::from_secs(RETENTION_INTERVAL_HOURS * 3_600),
        }
    }

    /// Scheduler with custom timings, for tests.
    #[must_use]
    pub fn with_timings(startup_delay: Duration, interval: Duration) -> Self {
        Self { timers: Mutex::new(None), startup_delay, interval }
    }

    /// Starts the scheduler. Calling `start` twice stops the previous
    /// instance first, so exactly one set of timers is ever live.
    pub fn start(&self, store: Store, policy: RetentionPolicy) {
        self.stop();

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let startup_delay = self.startup_delay;
        let interval = self.interval;
        let task = tokio::spawn(async move {
            tokio::select! {
                () = task_cancel.cancelled() => return,
                () = tokio::time::sleep(startup_delay) => {}
            }
            loop {
                run_once(&store, &policy).await;
                tokio::select! {
                    () = task_cancel.cancelled() => return,
                    () = tokio::time::sleep(interval) => {}
                }
            }
        });

        let mut timers = match self.timers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *timers = Some(Timers { cancel, task });
    }

    /// Stops both the startup timer and the periodic timer. Safe to call
    /// when not started.
    pub fn stop(&self) {
        let mut timers = match self.timers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(timers) = timers.take() {
            timers.cancel.cancel();
            timers.task.abort();
        }
    }

    /// Whether timers are currently scheduled.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.timers
            .lock()
            .map(|t| t.as_ref().is_some_and(|timers| !timers.task.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for RetentionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_once(store: &Store, policy: &RetentionPolicy) {
    if !policy.enabled {
        tracing::debug!("retention disabled, skipping run");
        return;
    }
    let store = store.clone();
    let policy = policy.clone();
    let result = blocking(move || store.prune(&policy, now_epoch_ms())).await;
    match result {
        Ok(stats) if stats.observations > 0 || stats.summaries > 0 => {
            tracing::info!(
                observations = stats.observations,
                summaries = stats.summaries,
                "retention pass pruned rows"
            );
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!("retention run failed: {e}");
        }
    }
}
