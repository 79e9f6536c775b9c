//! Daemon lifecycle supervisor.
//!
//! `ensure_worker` guarantees "a compatible worker is listening on the
//! configured port" before returning ready. Dependencies are injected
//! through [`WorkerControl`] so the state machine is unit-testable; a
//! version mismatch is a restart signal, never an error surface.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use pilot_mem_core::{
    DaemonConfig, HEALTH_COLD_START_TIMEOUT_MS, HEALTH_CONTENDED_TIMEOUT_MS,
    HEALTH_FAST_TIMEOUT_MS,
};

use crate::pid_file::{self, PidFileInfo};

/// Result of a version probe against a running worker.
#[derive(Debug, Clone)]
pub struct VersionCheck {
    pub matches: bool,
    pub plugin_version: String,
    pub worker_version: String,
}

/// Outcome of `ensure_worker`.
#[derive(Debug, Clone, Serialize)]
pub struct EnsureOutcome {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EnsureOutcome {
    fn ready() -> Self {
        Self { ready: true, error: None }
    }

    fn failed(message: &str) -> Self {
        Self { ready: false, error: Some(message.to_owned()) }
    }
}

/// Injected side effects of the supervisor state machine.
#[async_trait]
pub trait WorkerControl: Send + Sync {
    /// Polls `/health` until it answers or `timeout` elapses.
    async fn wait_for_health(&self, port: u16, timeout: Duration) -> bool;
    /// Compares the worker's reported version with this binary's.
    async fn check_version_match(&self, port: u16) -> VersionCheck;
    /// Asks a running worker to exit via `POST /api/restart`.
    async fn http_shutdown(&self, port: u16) -> bool;
    /// Waits until the port can be bound again.
    async fn wait_port_free(&self, port: u16, timeout: Duration) -> bool;
    /// Whether something is listening on the port right now.
    async fn port_in_use(&self, port: u16) -> bool;
    /// Spawns a detached worker daemon; returns its pid, or `None`.
    async fn spawn_daemon(&self, port: u16) -> Option<u32>;
    /// Records the spawned worker's pid file.
    fn write_pid_file(&self, info: &PidFileInfo) -> std::io::Result<()>;
    /// Removes the pid file.
    fn remove_pid_file(&self);
}

/// Multiplier applied to every bounded wait, for slower platforms.
#[must_use]
pub fn platform_timeout(base: Duration) -> Duration {
    if cfg!(windows) {
        base * 2
    } else {
        base
    }
}

/// Drives the supervisor state machine to a ready worker or a failure.
pub async fn ensure_worker(control: &dyn WorkerControl, port: u16) -> EnsureOutcome {
    // Fast path: an answering worker on the expected port.
    if control
        .wait_for_health(port, platform_timeout(Duration::from_millis(HEALTH_FAST_TIMEOUT_MS)))
        .await
    {
        let check = control.check_version_match(port).await;
        if check.matches {
            return EnsureOutcome::ready();
        }
        // Version mismatch is a signal to restart cleanly, not an error.
        tracing::info!(
            plugin = %check.plugin_version,
            worker = %check.worker_version,
            "worker version mismatch, restarting"
        );
        control.http_shutdown(port).await;
        control
            .wait_port_free(port, platform_timeout(Duration::from_millis(5_000)))
            .await;
        control.remove_pid_file();
        return cold_start(control, port).await;
    }

    if control.port_in_use(port).await {
        // Something holds the port but did not answer the fast probe; give
        // it the long timeout before declaring contention.
        if control
            .wait_for_health(
                port,
                platform_timeout(Duration::from_millis(HEALTH_CONTENDED_TIMEOUT_MS)),
            )
            .await
        {
            return EnsureOutcome::ready();
        }
        return EnsureOutcome::failed("port in use but worker not responding");
    }

    cold_start(control, port).await
}

async fn cold_start(control: &dyn WorkerControl, port: u16) -> EnsureOutcome {
    let Some(pid) = control.spawn_daemon(port).await else {
        return EnsureOutcome::failed("failed to spawn worker daemon");
    };
    let info = PidFileInfo {
        pid,
        port,
        started_at_epoch: chrono_now_epoch_ms(),
    };
    if let Err(e) = control.write_pid_file(&info) {
        tracing::warn!("failed to write pid file: {e}");
    }
    if control
        .wait_for_health(
            port,
            platform_timeout(Duration::from_millis(HEALTH_COLD_START_TIMEOUT_MS)),
        )
        .await
    {
        EnsureOutcome::ready()
    } else {
        control.remove_pid_file();
        EnsureOutcome::failed("worker health check timeout")
    }
}

fn chrono_now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Production [`WorkerControl`] over HTTP probes and process spawn.
pub struct RealWorkerControl {
    config: DaemonConfig,
    client: reqwest::Client,
}

impl RealWorkerControl {
    #[must_use]
    pub fn new(config: DaemonConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    fn base_url(&self, port: u16) -> String {
        format!("http://{}:{port}", self.config.host)
    }
}

#[async_trait]
impl WorkerControl for RealWorkerControl {
    async fn wait_for_health(&self, port: u16, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let url = format!("{}/health", self.base_url(port));
        loop {
            let probe = self
                .client
                .get(&url)
                .timeout(Duration::from_millis(500))
                .send()
                .await;
            if probe.is_ok_and(|r| r.status().is_success()) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    async fn check_version_match(&self, port: u16) -> VersionCheck {
        let plugin_version = pilot_mem_http::WORKER_VERSION.to_owned();
        let url = format!("{}/api/version", self.base_url(port));
        let worker_version = match self.client.get(&url).send().await {
            Ok(resp) => resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("version").and_then(|s| s.as_str()).map(ToOwned::to_owned))
                .unwrap_or_default(),
            Err(_) => String::new(),
        };
        VersionCheck { matches: worker_version == plugin_version, plugin_version, worker_version }
    }

    async fn http_shutdown(&self, port: u16) -> bool {
        let url = format!("{}/api/restart", self.base_url(port));
        self.client
            .post(&url)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
    }

    async fn wait_port_free(&self, port: u16, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.port_in_use(port).await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn port_in_use(&self, port: u16) -> bool {
        tokio::net::TcpListener::bind((self.config.bind.as_str(), port))
            .await
            .is_err()
    }

    async fn spawn_daemon(&self, port: u16) -> Option<u32> {
        let exe = std::env::current_exe().ok()?;
        let child = std::process::Command::new(exe)
            .args(["serve", "--port", &port.to_string()])
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();
        match child {
            Ok(child) => Some(child.id()),
            Err(e) => {
                tracing::error!("failed to spawn worker daemon: {e}");
                None
            }
        }
    }

    fn write_pid_file(&self, info: &PidFileInfo) -> std::io::Result<()> {
        pid_file::write(&self.config.pid_file_path(), info)
    }

    fn remove_pid_file(&self) {
        pid_file::remove(&self.config.pid_file_path());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted control: health answers pop from a queue; every call is
    /// recorded for assertions.
    struct FakeControl {
        health_answers: Mutex<Vec<bool>>,
        version_matches: bool,
        spawn_pid: Option<u32>,
        spawn_calls: AtomicUsize,
        port_in_use: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeControl {
        fn new(health_answers: Vec<bool>) -> Self {
            Self {
                health_answers: Mutex::new(health_answers),
                version_matches: true,
                spawn_pid: Some(99_999),
                spawn_calls: AtomicUsize::new(0),
                port_in_use: false,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }

        fn called(&self, call: &str) -> bool {
            self.calls.lock().unwrap().iter().any(|c| *c == call)
        }
    }

    #[async_trait]
    impl WorkerControl for FakeControl {
        async fn wait_for_health(&self, _port: u16, _timeout: Duration) -> bool {
            self.record("wait_for_health");
            let mut answers = self.health_answers.lock().unwrap();
            if answers.is_empty() {
                false
            } else {
                answers.remove(0)
            }
        }

        async fn check_version_match(&self, _port: u16) -> VersionCheck {
            self.record("check_version_match");
            VersionCheck {
                matches: self.version_matches,
                plugin_version: "2.0.0".to_owned(),
                worker_version: if self.version_matches { "2.0.0" } else { "1.0.0" }.to_owned(),
            }
        }

        async fn http_shutdown(&self, _port: u16) -> bool {
            self.record("http_shutdown");
            true
        }

        async fn wait_port_free(&self, _port: u16, _timeout: Duration) -> bool {
            self.record("wait_port_free");
            true
        }

        async fn port_in_use(&self, _port: u16) -> bool {
            self.record("port_in_use");
            self.port_in_use
        }

        async fn spawn_daemon(&self, _port: u16) -> Option<u32> {
            self.record("spawn_daemon");
            self.spawn_calls.fetch_add(1, Ordering::SeqCst);
            self.spawn_pid
        }

        fn write_pid_file(&self, _info: &PidFileInfo) -> std::io::Result<()> {
            self.record("write_pid_file");
            Ok(())
        }

        fn remove_pid_file(&self) {
            self.record("remove_pid_file");
        }
    }

    #[tokio::test]
    async fn healthy_matching_worker_spawns_nothing() {
        let control = FakeControl::new(vec![true]);

        let outcome = ensure_worker(&control, 41777).await;

        assert!(outcome.ready);
        assert_eq!(control.spawn_calls.load(Ordering::SeqCst), 0);
        assert!(!control.called("write_pid_file"));
    }

    #[tokio::test]
    async fn version_mismatch_restarts_cleanly() {
        // Health: true (running worker), then true again after respawn.
        let mut control = FakeControl::new(vec![true, true]);
        control.version_matches = false;

        let outcome = ensure_worker(&control, 41777).await;

        assert!(outcome.ready);
        assert!(outcome.error.is_none());
        assert_eq!(control.spawn_calls.load(Ordering::SeqCst), 1);
        assert!(control.called("http_shutdown"));
        assert!(control.called("wait_port_free"));
        assert!(control.called("remove_pid_file"));
        assert!(control.called("write_pid_file"));
    }

    #[tokio::test]
    async fn spawn_failure_reports_without_pid_file() {
        let mut control = FakeControl::new(vec![false]);
        control.spawn_pid = None;

        let outcome = ensure_worker(&control, 41777).await;

        assert!(!outcome.ready);
        assert_eq!(outcome.error.as_deref(), Some("failed to spawn worker daemon"));
        assert!(!control.called("write_pid_file"));
    }

    #[tokio::test]
    async fn contended_port_that_never_answers_fails() {
        let mut control = FakeControl::new(vec![false, false]);
        control.port_in_use = true;

        let outcome = ensure_worker(&control, 41777).await;

        assert!(!outcome.ready);
        assert_eq!(outcome.error.as_deref(), Some("port in use but worker not responding"));
        assert_eq!(control.spawn_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn contended_port_that_recovers_is_ready() {
        let mut control = FakeControl::new(vec![false, true]);
        control.port_in_use = true;

        let outcome = ensure_worker(&control, 41777).await;

        assert!(outcome.ready);
        assert_eq!(control.spawn_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cold_start_health_timeout_cleans_up() {
        // Not healthy, port free, spawn succeeds, never becomes healthy.
        let control = FakeControl::new(vec![false, false]);

        let outcome = ensure_worker(&control, 41777).await;

        assert!(!outcome.ready);
        assert_eq!(outcome.error.as_deref(), Some("worker health check timeout"));
        assert!(control.called("write_pid_file"));
        assert!(control.called("remove_pid_file"));
    }
}
