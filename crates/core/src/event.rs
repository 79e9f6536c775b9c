//! Event frames broadcast to dashboard clients over SSE.

use serde::Serialize;

use crate::observation::Observation;
use crate::plan::PlanStatus;
use crate::session::{SessionSummary, UserPrompt};

/// One event frame, serialized as `data: <json>\n\n` with a `type` field.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum WorkerEvent {
    /// A new observation was materialized.
    NewObservation { observation: Observation },
    /// A new session summary was stored.
    NewSummary { summary: SessionSummary },
    /// A new user prompt was recorded.
    NewPrompt { prompt: UserPrompt },
    /// Queue processing state changed.
    ProcessingStatus { active: bool, queue_depth: u64 },
    /// First frame on connect: the known project list.
    InitialLoad { projects: Vec<String> },
    /// A session↔plan association was created, updated, or cleared.
    PlanAssociationChanged {
        session_db_id: i64,
        plan_path: Option<String>,
        plan_status: Option<PlanStatus>,
    },
}

impl WorkerEvent {
    /// Serializes the event into an SSE data payload.
    #[must_use]
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_owned())
    }
}
