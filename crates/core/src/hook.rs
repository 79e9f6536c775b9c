//! Hook wire types for editor integration.
//!
//! Hooks are thin callers that POST JSON to the worker and consume responses.

use serde::{Deserialize, Serialize};

/// Request body for `POST /api/sessions/observations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationIngest {
    #[serde(rename = "contentSessionId")]
    pub content_session_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    #[serde(default)]
    pub tool_response: serde_json::Value,
    pub cwd: String,
    /// Updated memory session id, present when the editor re-keys.
    #[serde(rename = "memorySessionId", skip_serializing_if = "Option::is_none")]
    pub memory_session_id: Option<String>,
}

/// Request body for `POST /api/sessions/summarize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeIngest {
    #[serde(rename = "contentSessionId")]
    pub content_session_id: String,
    pub last_assistant_message: String,
    #[serde(default)]
    pub cwd: Option<String>,
}

/// Request body for `POST /api/sessions/prompts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptIngest {
    #[serde(rename = "contentSessionId")]
    pub content_session_id: String,
    pub prompt: String,
    #[serde(default)]
    pub cwd: Option<String>,
}

/// Request body for plan association routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanAssociationRequest {
    #[serde(rename = "planPath")]
    pub plan_path: String,
    #[serde(rename = "planStatus", default)]
    pub plan_status: Option<String>,
}

/// Request body for `PUT /api/sessions/:id/plan/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStatusRequest {
    #[serde(rename = "planStatus")]
    pub plan_status: String,
}

/// Reply printed by hook CLIs so the editor never aborts on worker trouble.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HookReply {
    /// Whether the editor should continue the turn.
    #[serde(rename = "continue")]
    pub continue_: bool,
    /// Whether the hook's own output should be hidden from the transcript.
    #[serde(rename = "suppressOutput")]
    pub suppress_output: bool,
}

impl HookReply {
    /// The tolerant reply used whenever the worker fails to answer.
    #[must_use]
    pub const fn carry_on() -> Self {
        Self { continue_: true, suppress_output: true }
    }
}
