//! Reader for editor transcript files.
//!
//! Transcripts live at `~/.claude/projects/<cwd-dashed>/<memory_id>.jsonl`,
//! one JSON message per line. Malformed lines are skipped; a missing file is
//! an empty section, not an error.

use std::path::PathBuf;

use pilot_mem_core::{dashed_cwd, strip_system_reminders};

/// Derives the transcript path for a session's working directory and memory
/// session id.
#[must_use]
pub fn transcript_path(cwd: &str, memory_session_id: &str) -> Option<PathBuf> {
    let home = dirs::home_dir()?;
    Some(
        home.join(".claude")
            .join("projects")
            .join(dashed_cwd(cwd))
            .join(format!("{memory_session_id}.jsonl")),
    )
}

/// Extracts the last assistant message from transcript content.
///
/// Walks every line, tolerating malformed JSON (skip and continue), keeps
/// the newest `type == "assistant"` entry, concatenates its text blocks, and
/// strips `<system-reminder>` blocks.
#[must_use]
pub fn last_assistant_message(content: &str) -> Option<String> {
    let mut last: Option<serde_json::Value> = None;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(msg) => {
                if msg.get("type").and_then(|t| t.as_str()) == Some("assistant") {
                    last = Some(msg);
                }
            }
            Err(e) => {
                tracing::debug!("skipping malformed transcript line: {e}");
            }
        }
    }

    let message = last?;
    let content = message.get("message")?.get("content")?;
    let text = match content {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(blocks) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    let text = strip_system_reminders(&text).trim().to_owned();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
