//! Deterministic observation derivation from raw tool events.
//!
//! The hooks ship the tool call as-is; the queue processor turns it into a
//! structured [`Observation`] here. Classification is rule-based: the tool
//! name decides read vs. write, the input text refines the type.

use serde_json::Value;

use crate::observation::{Observation, ObservationType};
use crate::text::sanitize_project_path;

const MAX_TITLE_LEN: usize = 100;
const MAX_FACTS: usize = 6;
const MAX_FACT_LEN: usize = 200;

/// A raw tool-use event as received from the editor hook.
#[derive(Debug, Clone)]
pub struct ToolEvent {
    /// Tool name reported by the editor.
    pub tool_name: String,
    /// Tool input parameters.
    pub tool_input: Value,
    /// Tool response payload.
    pub tool_response: Value,
    /// Working directory of the session.
    pub cwd: String,
}

/// Builds an observation from a tool event.
///
/// `id` is left at zero; the store assigns the rowid on insert.
#[must_use]
pub fn build_observation(
    memory_session_id: &str,
    project: &str,
    event: &ToolEvent,
    created_at_epoch: i64,
) -> Observation {
    let observation_type = classify(event);
    let target = primary_target(&event.tool_input);
    let response_text = value_text(&event.tool_response);

    let title = match target.as_deref() {
        Some(t) => truncate(&format!("{}: {}", event.tool_name, t), MAX_TITLE_LEN),
        None => truncate(&event.tool_name, MAX_TITLE_LEN),
    };
    let subtitle = target
        .as_deref()
        .map(|t| sanitize_project_path(t, project))
        .filter(|t| *t != title);

    let (files_read, files_modified) = file_lists(event, observation_type, project);

    Observation {
        id: 0,
        memory_session_id: memory_session_id.to_owned(),
        project: project.to_owned(),
        observation_type,
        title,
        subtitle,
        narrative: narrative_from(&response_text),
        facts: facts_from(&response_text),
        concepts: concepts_for(observation_type),
        files_read,
        files_modified,
        discovery_tokens: estimate_tokens(&response_text),
        created_at_epoch,
    }
}

/// Rough token estimate: one token per four characters of response text.
#[must_use]
pub fn estimate_tokens(text: &str) -> i64 {
    (text.len() / 4) as i64
}

fn classify(event: &ToolEvent) -> ObservationType {
    let tool = event.tool_name.to_lowercase();
    if matches!(tool.as_str(), "exitplanmode" | "planproposal") {
        return ObservationType::Decision;
    }
    let writes = matches!(tool.as_str(), "edit" | "write" | "multiedit" | "notebookedit");
    if writes || tool == "bash" {
        let input_text = value_text(&event.tool_input).to_lowercase();
        if input_text.contains("fix") || input_text.contains("bug") {
            return ObservationType::Bugfix;
        }
        if input_text.contains("refactor") {
            return ObservationType::Refactor;
        }
        if writes {
            return if input_text.contains("feat") || input_text.contains("add ") {
                ObservationType::Feature
            } else {
                ObservationType::Change
            };
        }
    }
    ObservationType::Discovery
}

fn concepts_for(observation_type: ObservationType) -> Vec<String> {
    let tags: &[&str] = match observation_type {
        ObservationType::Discovery => &["how-it-works"],
        ObservationType::Bugfix => &["problem-solution", "what-changed"],
        ObservationType::Feature | ObservationType::Change | ObservationType::Refactor => {
            &["what-changed"]
        }
        ObservationType::Decision => &["why-it-exists", "trade-off"],
    };
    tags.iter().map(|t| (*t).to_owned()).collect()
}

/// Picks the most descriptive input field for the title.
fn primary_target(input: &Value) -> Option<String> {
    for key in ["file_path", "path", "command", "pattern", "query", "url", "plan"] {
        if let Some(v) = input.get(key).and_then(Value::as_str) {
            let v = v.trim();
            if !v.is_empty() {
                return Some(first_line(v).to_owned());
            }
        }
    }
    None
}

fn file_lists(
    event: &ToolEvent,
    observation_type: ObservationType,
    project: &str,
) -> (Vec<String>, Vec<String>) {
    let mut paths = Vec::new();
    for key in ["file_path", "path", "notebook_path"] {
        if let Some(p) = event.tool_input.get(key).and_then(Value::as_str) {
            paths.push(sanitize_project_path(p, project));
        }
    }
    match observation_type {
        ObservationType::Discovery | ObservationType::Decision => (paths, Vec::new()),
        _ => (Vec::new(), paths),
    }
}

fn narrative_from(response_text: &str) -> Option<String> {
    let line = first_line(response_text.trim());
    if line.is_empty() {
        None
    } else {
        Some(truncate(line, MAX_FACT_LEN))
    }
}

fn facts_from(response_text: &str) -> Vec<String> {
    response_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(MAX_FACTS)
        .map(|l| truncate(l, MAX_FACT_LEN))
        .collect()
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_owned()
    } else {
        let cut: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}\u{2026}")
    }
}
