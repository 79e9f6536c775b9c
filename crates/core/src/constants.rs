//! Shared constants for the pilot-mem worker.
//!
//! Centralizes defaults that would otherwise be duplicated across crates.

/// Default port the worker daemon listens on.
pub const DEFAULT_WORKER_PORT: u16 = 41777;

/// Default host for hook clients and health probes.
pub const DEFAULT_WORKER_HOST: &str = "127.0.0.1";

/// Queue iterator idle timeout before the session processor is evicted.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 180_000;

/// Maximum messages drained in one transactional claim.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;

/// Backoff after a transient claim error before the next attempt.
pub const CLAIM_ERROR_BACKOFF_MS: u64 = 1_000;

/// Total observations loaded for a context document.
pub const DEFAULT_OBSERVATION_COUNT: usize = 50;

/// Observations rendered in full detail at the top of the timeline.
pub const DEFAULT_FULL_OBSERVATION_COUNT: usize = 5;

/// Session summaries merged into the timeline.
pub const DEFAULT_SUMMARY_COUNT: usize = 3;

/// Baseline tokens a cold re-discovery of one observation would cost.
/// Used only for the savings figure in the context header.
pub const DISCOVERY_TOKEN_BASELINE: i64 = 1_200;

/// Delay before the first retention run after daemon start.
pub const RETENTION_STARTUP_DELAY_SECS: u64 = 30;

/// Cadence of retention runs.
pub const RETENTION_INTERVAL_HOURS: u64 = 24;

/// Rows deleted per retention transaction; larger sweeps chunk at this size.
pub const RETENTION_DELETE_CHUNK: usize = 100;

/// Health probe bound when checking an expected-running worker.
pub const HEALTH_FAST_TIMEOUT_MS: u64 = 1_000;

/// Health probe bound when a port is occupied but unverified.
pub const HEALTH_CONTENDED_TIMEOUT_MS: u64 = 15_000;

/// Health probe bound after a cold spawn.
pub const HEALTH_COLD_START_TIMEOUT_MS: u64 = 30_000;

/// Exit code hooks use to mean "show this message to the user without
/// injecting it into the model's context".
pub const HOOK_USER_MESSAGE_EXIT_CODE: i32 = 2;
