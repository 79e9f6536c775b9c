//! Daemon configuration from the environment.
//!
//! Replaces ambient module state with an explicit struct threaded from
//! `main` through constructors.

use std::path::PathBuf;

use crate::constants::DEFAULT_WORKER_PORT;

/// Parse an environment variable with a default fallback.
///
/// - If the variable is not set: returns `default` silently (expected case).
/// - If the variable is set but cannot be parsed: logs a warning and returns
///   `default`.
pub fn env_parse_with_default<T: std::str::FromStr + std::fmt::Display>(
    var: &str,
    default: T,
) -> T {
    match std::env::var(var) {
        Ok(v) => match v.parse() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!(
                    var,
                    value = %v,
                    default = %default,
                    "invalid env var value, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// Filter for projects excluded from capture via `EXCLUDE_PROJECTS`.
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    excluded: Vec<String>,
}

impl ProjectFilter {
    /// Parses a JSON array of project names; invalid JSON yields an empty
    /// filter with a warning.
    #[must_use]
    pub fn from_json(raw: &str) -> Self {
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(excluded) => Self { excluded },
            Err(e) => {
                tracing::warn!(error = %e, "invalid EXCLUDE_PROJECTS value, ignoring");
                Self::default()
            }
        }
    }

    /// Whether the given project is excluded from capture.
    #[must_use]
    pub fn is_excluded(&self, project: &str) -> bool {
        self.excluded.iter().any(|p| p == project)
    }
}

/// Worker daemon configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Port the worker listens on (`WORKER_PORT`).
    pub port: u16,
    /// Host hooks and probes connect to (`WORKER_HOST`).
    pub host: String,
    /// Address the listener binds (`WORKER_BIND`, defaults to the host).
    pub bind: String,
    /// Data directory holding the database and pid file (`DATA_DIR`).
    pub data_dir: PathBuf,
    /// Session id of the hosting editor session (`PILOT_SESSION_ID`).
    pub pilot_session_id: Option<String>,
    /// Context injection opt-out (`NO_CONTEXT`).
    pub no_context: bool,
    /// Projects excluded from capture (`EXCLUDE_PROJECTS`).
    pub exclude_projects: ProjectFilter,
}

impl DaemonConfig {
    /// Resolves configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let host = std::env::var("WORKER_HOST")
            .unwrap_or_else(|_| crate::constants::DEFAULT_WORKER_HOST.to_owned());
        let bind = std::env::var("WORKER_BIND").unwrap_or_else(|_| host.clone());
        let data_dir = std::env::var("DATA_DIR").map_or_else(
            |_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".pilot")
            },
            PathBuf::from,
        );
        let exclude_projects = std::env::var("EXCLUDE_PROJECTS")
            .map(|raw| ProjectFilter::from_json(&raw))
            .unwrap_or_default();
        Self {
            port: env_parse_with_default("WORKER_PORT", DEFAULT_WORKER_PORT),
            host,
            bind,
            data_dir,
            pilot_session_id: std::env::var("PILOT_SESSION_ID")
                .ok()
                .map(|s| s.trim().to_owned())
                .filter(|s| !s.is_empty()),
            no_context: std::env::var("NO_CONTEXT").is_ok_and(|v| !v.is_empty() && v != "0"),
            exclude_projects,
        }
    }

    /// Path of the SQLite database file.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("memory.db")
    }

    /// Path of the pid file written on spawn.
    #[must_use]
    pub fn pid_file_path(&self) -> PathBuf {
        self.data_dir.join("worker.pid")
    }

    /// Base URL hooks use to reach the worker.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Path of the session-scoped active plan file, when the hosting editor
    /// session is known.
    #[must_use]
    pub fn active_plan_path(&self) -> Option<PathBuf> {
        self.pilot_session_id
            .as_deref()
            .map(|sid| self.data_dir.join("sessions").join(sid).join("active_plan.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_valid_value() {
        let var = "TEST_PILOT_ENV_PARSE_VALID_41811";
        std::env::set_var(var, "42");
        let result: u32 = env_parse_with_default(var, 10);
        assert_eq!(result, 42);
        std::env::remove_var(var);
    }

    #[test]
    fn env_parse_invalid_value_falls_back() {
        let var = "TEST_PILOT_ENV_PARSE_INVALID_41812";
        std::env::set_var(var, "banana");
        let result: u16 = env_parse_with_default(var, 7);
        assert_eq!(result, 7);
        std::env::remove_var(var);
    }

    #[test]
    fn project_filter_parses_json_array() {
        let filter = ProjectFilter::from_json(r#"["secrets", "scratch"]"#);
        assert!(filter.is_excluded("secrets"));
        assert!(!filter.is_excluded("pilot"));
    }

    #[test]
    fn project_filter_tolerates_garbage() {
        let filter = ProjectFilter::from_json("not json");
        assert!(!filter.is_excluded("anything"));
    }
}
