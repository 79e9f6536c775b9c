//! Materialization of claimed queue rows into store writes.
//!
//! The consumer side of the pending queue: parse the payload envelope,
//! build the observation/summary/prompt, write it, and notify the UI.
//! Malformed payloads are corruption: logged, skipped, never a batch abort.

use serde::Deserialize;
use tokio::sync::broadcast;

use pilot_mem_core::builder::{build_observation, ToolEvent};
use pilot_mem_core::{
    strip_system_reminders, PayloadKind, SessionStatus, SessionSummary, WorkerError, WorkerEvent,
};
use pilot_mem_storage::{PendingRow, Store};

#[derive(Debug, Deserialize)]
struct ObservationBody {
    memory_session_id: String,
    project: String,
    tool_name: String,
    #[serde(default)]
    tool_input: serde_json::Value,
    #[serde(default)]
    tool_response: serde_json::Value,
    #[serde(default)]
    cwd: String,
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    memory_session_id: String,
    project: String,
    last_assistant_message: String,
}

#[derive(Debug, Deserialize)]
struct PromptBody {
    content_session_id: String,
    #[serde(default)]
    project: Option<String>,
    prompt: String,
}

/// Processes one claimed queue row end to end.
///
/// # Errors
/// Returns [`WorkerError::Corruption`] for malformed payloads and database
/// errors as [`WorkerError::Transient`]; the caller logs and continues.
pub fn materialize(
    store: &Store,
    events: &broadcast::Sender<WorkerEvent>,
    row: &PendingRow,
) -> Result<(), WorkerError> {
    let message = row.to_pending_message()?;
    let body = message.payload.body;
    match message.payload.kind {
        PayloadKind::Observation => {
            let body: ObservationBody = parse_body(body)?;
            let event = ToolEvent {
                tool_name: body.tool_name,
                tool_input: body.tool_input,
                tool_response: body.tool_response,
                cwd: body.cwd,
            };
            let mut observation = build_observation(
                &body.memory_session_id,
                &body.project,
                &event,
                row.created_at_epoch,
            );
            observation.id = store
                .insert_observation(&observation)
                .map_err(|e| WorkerError::Transient(e.to_string()))?;
            tracing::info!(
                id = observation.id,
                title = %observation.title,
                "materialized observation"
            );
            let _ = events.send(WorkerEvent::NewObservation { observation });
        }
        PayloadKind::Summary => {
            let body: SummaryBody = parse_body(body)?;
            let mut summary = parse_summary_sections(
                &body.memory_session_id,
                &body.project,
                &body.last_assistant_message,
            );
            summary.created_at_epoch = row.created_at_epoch;
            summary.id = store
                .insert_summary(&summary)
                .map_err(|e| WorkerError::Transient(e.to_string()))?;
            store
                .set_session_status(row.session_db_id, SessionStatus::Completed)
                .map_err(|e| WorkerError::Transient(e.to_string()))?;
            let _ = events.send(WorkerEvent::NewSummary { summary });
        }
        PayloadKind::Prompt => {
            let body: PromptBody = parse_body(body)?;
            let prompt = store
                .insert_user_prompt(
                    &body.content_session_id,
                    &body.prompt,
                    body.project.as_deref(),
                    row.created_at_epoch,
                )
                .map_err(|e| WorkerError::Transient(e.to_string()))?;
            let _ = events.send(WorkerEvent::NewPrompt { prompt });
        }
    }
    Ok(())
}

fn parse_body<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T, WorkerError> {
    serde_json::from_value(body)
        .map_err(|e| WorkerError::Corruption(format!("malformed payload body: {e}")))
}

const SECTION_LABELS: &[&str] = &["request", "investigated", "learned", "completed", "next steps"];

/// Splits an end-of-turn assistant message into the five summary sections.
///
/// Lines starting with a known label (`Request:`, `Investigated:`, ...)
/// open a section; following lines accumulate into it. A message with no
/// labels at all becomes the request verbatim.
#[must_use]
pub(crate) fn parse_summary_sections(
    memory_session_id: &str,
    project: &str,
    message: &str,
) -> SessionSummary {
    let message = strip_system_reminders(message);
    let mut sections: Vec<(usize, String)> = Vec::new();
    let mut current: Option<usize> = None;

    for line in message.lines() {
        let trimmed = line.trim().trim_start_matches(['*', '#', '-', ' ']);
        let label = SECTION_LABELS.iter().position(|label| {
            trimmed.len() > label.len()
                && trimmed.is_char_boundary(label.len())
                && trimmed[..label.len()].eq_ignore_ascii_case(label)
                && trimmed[label.len()..].trim_start_matches('*').starts_with(':')
        });
        if let Some(idx) = label {
            let rest = trimmed
                .splitn(2, ':')
                .nth(1)
                .unwrap_or_default()
                .trim()
                .to_owned();
            sections.push((idx, rest));
            current = Some(sections.len() - 1);
        } else if let Some(open) = current {
            let section = &mut sections[open].1;
            if !line.trim().is_empty() {
                if !section.is_empty() {
                    section.push('\n');
                }
                section.push_str(line.trim());
            }
        }
    }

    let pick = |idx: usize| -> Option<String> {
        sections
            .iter()
            .find(|(i, text)| *i == idx && !text.is_empty())
            .map(|(_, text)| text.clone())
    };

    let request = pick(0).or_else(|| {
        let whole = message.trim();
        (!whole.is_empty() && sections.is_empty()).then(|| whole.to_owned())
    });

    SessionSummary {
        id: 0,
        memory_session_id: memory_session_id.to_owned(),
        project: project.to_owned(),
        request,
        investigated: pick(1),
        learned: pick(2),
        completed: pick(3),
        next_steps: pick(4),
        created_at_epoch: 0,
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use pilot_mem_core::{Observation, ObservationType};

    pub(crate) fn observation(memory_id: &str) -> Observation {
        Observation {
            id: 0,
            memory_session_id: memory_id.to_owned(),
            project: "pilot".to_owned(),
            observation_type: ObservationType::Discovery,
            title: "fixture".to_owned(),
            subtitle: None,
            narrative: None,
            facts: vec![],
            concepts: vec![],
            files_read: vec![],
            files_modified: vec![],
            discovery_tokens: 10,
            created_at_epoch: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_mem_core::QueuePayload;
    use tempfile::TempDir;

    #[test]
    fn parses_labelled_sections() {
        let summary = parse_summary_sections(
            "mem-1",
            "pilot",
            "Request: add retries\nInvestigated: the http client\nLearned: it times out\n\
             Completed: retry loop\nNext steps: tune the backoff",
        );
        assert_eq!(summary.request.as_deref(), Some("add retries"));
        assert_eq!(summary.investigated.as_deref(), Some("the http client"));
        assert_eq!(summary.learned.as_deref(), Some("it times out"));
        assert_eq!(summary.completed.as_deref(), Some("retry loop"));
        assert_eq!(summary.next_steps.as_deref(), Some("tune the backoff"));
    }

    #[test]
    fn bold_markdown_labels_are_recognized() {
        let summary =
            parse_summary_sections("mem-1", "pilot", "**Request**: ship it\n**Learned**: plenty");
        assert_eq!(summary.request.as_deref(), Some("ship it"));
        assert_eq!(summary.learned.as_deref(), Some("plenty"));
    }

    #[test]
    fn unlabelled_message_becomes_the_request() {
        let summary = parse_summary_sections("mem-1", "pilot", "Just fixed the thing.");
        assert_eq!(summary.request.as_deref(), Some("Just fixed the thing."));
        assert!(summary.learned.is_none());
    }

    #[test]
    fn multi_line_sections_accumulate() {
        let summary =
            parse_summary_sections("mem-1", "pilot", "Learned: first\nsecond line\n\nRequest: x");
        assert_eq!(summary.learned.as_deref(), Some("first\nsecond line"));
    }

    fn store_with_session() -> (Store, i64, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        let session = store.create_session("content-1", "pilot", None, 1_000).unwrap();
        (store, session, dir)
    }

    #[test]
    fn observation_row_materializes_and_broadcasts() {
        let (store, session, _dir) = store_with_session();
        let (events, mut rx) = broadcast::channel(8);
        let payload = serde_json::to_string(&QueuePayload::new(
            PayloadKind::Observation,
            serde_json::json!({
                "memory_session_id": "content-1",
                "project": "pilot",
                "tool_name": "Read",
                "tool_input": {"file_path": "/x/pilot/src/lib.rs"},
                "tool_response": "contents",
                "cwd": "/x/pilot",
            }),
        ))
        .unwrap();
        store.enqueue(session, &payload, 5_000).unwrap();
        let row = store.claim_and_delete(session).unwrap().unwrap();

        materialize(&store, &events, &row).unwrap();

        let stored = store.query_observations("pilot", &[], &[], 10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].created_at_epoch, 5_000);
        assert!(matches!(rx.try_recv().unwrap(), WorkerEvent::NewObservation { .. }));
    }

    #[test]
    fn summary_row_completes_the_session() {
        let (store, session, _dir) = store_with_session();
        let (events, _rx) = broadcast::channel(8);
        let payload = serde_json::to_string(&QueuePayload::new(
            PayloadKind::Summary,
            serde_json::json!({
                "memory_session_id": "content-1",
                "project": "pilot",
                "last_assistant_message": "Completed: the work",
            }),
        ))
        .unwrap();
        store.enqueue(session, &payload, 5_000).unwrap();
        let row = store.claim_and_delete(session).unwrap().unwrap();

        materialize(&store, &events, &row).unwrap();

        let summaries = store.get_recent_summaries("pilot", 10).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].completed.as_deref(), Some("the work"));
        let updated = store.get_session(session).unwrap().unwrap();
        assert_eq!(updated.status, SessionStatus::Completed);
    }

    #[test]
    fn corrupt_payload_is_reported_not_fatal() {
        let (store, session, _dir) = store_with_session();
        let (events, _rx) = broadcast::channel(8);
        store.enqueue(session, "{broken", 5_000).unwrap();
        let row = store.claim_and_delete(session).unwrap().unwrap();

        let err = materialize(&store, &events, &row).unwrap_err();
        assert!(matches!(err, WorkerError::Corruption(_)));
    }
}
