//! Session types for memory sessions.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WorkerError;

/// One editor conversation tracked by the worker.
///
/// `content_session_id` is the stable identity supplied by the editor;
/// `memory_session_id` keys observations and summaries and may be rewritten
/// once when the editor re-keys the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkSession {
    /// Internal database id.
    pub id: i64,
    /// Externally supplied session id (unique).
    pub content_session_id: String,
    /// Memory session id used by observations and summaries.
    pub memory_session_id: String,
    /// Project name derived from the working directory.
    pub project: String,
    /// Current session status.
    pub status: SessionStatus,
    /// Session start time, epoch milliseconds.
    pub started_at_epoch: i64,
}

/// Session status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum SessionStatus {
    /// Session is active
    Active,
    /// Session completed
    Completed,
}

impl SessionStatus {
    /// Returns the string representation of the session status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(WorkerError::ContractViolation(format!("invalid session status: {s}"))),
        }
    }
}

/// One end-of-turn synthesis of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Internal database id.
    pub id: i64,
    /// Memory session this summary belongs to.
    pub memory_session_id: String,
    /// Project name.
    pub project: String,
    /// What was requested.
    pub request: Option<String>,
    /// What was investigated.
    pub investigated: Option<String>,
    /// What was learned.
    pub learned: Option<String>,
    /// What was completed.
    pub completed: Option<String>,
    /// Next steps.
    pub next_steps: Option<String>,
    /// When the summary was created, epoch milliseconds.
    pub created_at_epoch: i64,
}

/// User prompt within a session, ordered by `prompt_number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPrompt {
    /// Internal database id.
    pub id: i64,
    /// Content session this prompt belongs to.
    pub content_session_id: String,
    /// Prompt number within the session (1-based).
    pub prompt_number: u32,
    /// Literal prompt text.
    pub prompt_text: String,
    /// Project context.
    pub project: Option<String>,
    /// When the prompt was recorded, epoch milliseconds.
    pub created_at_epoch: i64,
}

/// Formats an epoch-milliseconds timestamp as an ISO 8601 string for display.
#[must_use]
pub fn iso_from_epoch_ms(epoch_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(epoch_ms)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_default()
}
