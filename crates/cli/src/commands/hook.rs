//! Editor hook entry points.
//!
//! Hooks are thin, tolerant callers: they POST JSON to the worker and never
//! abort the host editor. When the worker fails to answer, the hook prints
//! `{"continue": true, "suppressOutput": true}` and exits zero; only
//! structural ingestion failures surface to the user.

use std::io::{IsTerminal, Read};
use std::path::Path;

use anyhow::Result;
use clap::Subcommand;

use pilot_mem_core::{
    project_from_cwd, DaemonConfig, HookReply, ObservationIngest, PromptIngest, SummarizeIngest,
    HOOK_USER_MESSAGE_EXIT_CODE,
};

#[derive(Subcommand)]
pub(crate) enum HookCommands {
    /// Fetch the context document for session start.
    Context {
        #[arg(short, long)]
        project: Option<String>,
        #[arg(long)]
        colors: bool,
    },
    /// Record one tool-use event.
    Observe,
    /// Record the end-of-turn summary.
    Summarize,
    /// Record a user prompt.
    Prompt,
}

fn read_hook_stdin() -> serde_json::Value {
    if std::io::stdin().is_terminal() {
        return serde_json::Value::Null;
    }
    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(&input).unwrap_or(serde_json::Value::Null)
}

fn stdin_str(data: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| data.get(k).and_then(|v| v.as_str()))
        .map(ToOwned::to_owned)
}

/// Reads the session's `active_plan.json` tolerantly: a missing file or
/// malformed JSON simply means no plan scope.
pub(crate) fn read_active_plan_path(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let json: serde_json::Value = serde_json::from_str(&content).ok()?;
    json.get("plan_path")
        .and_then(|v| v.as_str())
        .filter(|p| !p.is_empty())
        .map(ToOwned::to_owned)
}

/// Builds the context-inject URL with percent-encoded query parameters.
pub(crate) fn build_context_inject_url(
    endpoint: &str,
    projects: &[String],
    plan_path: Option<&str>,
    colors: bool,
) -> Result<String> {
    let mut params: Vec<(&str, String)> = vec![("projects", projects.join(","))];
    if let Some(plan) = plan_path {
        params.push(("planPath", plan.to_owned()));
    }
    if colors {
        params.push(("colors", "true".to_owned()));
    }
    let url = reqwest::Url::parse_with_params(&format!("{endpoint}/api/context/inject"), &params)?;
    Ok(url.to_string())
}

fn carry_on() -> Result<()> {
    println!("{}", serde_json::to_string(&HookReply::carry_on())?);
    Ok(())
}

pub(crate) async fn run(cmd: HookCommands, config: &DaemonConfig) -> Result<()> {
    let client = reqwest::Client::new();
    let endpoint = config.endpoint();
    let stdin = read_hook_stdin();
    let cwd = stdin_str(&stdin, &["cwd"])
        .or_else(|| std::env::current_dir().ok().map(|p| p.to_string_lossy().into_owned()))
        .unwrap_or_default();
    let content_session_id = stdin_str(&stdin, &["session_id", "contentSessionId"]);

    match cmd {
        HookCommands::Context { project, colors } => {
            if config.no_context {
                return Ok(());
            }
            let projects = vec![project.unwrap_or_else(|| project_from_cwd(&cwd))];
            let plan_path = config
                .active_plan_path()
                .and_then(|p| read_active_plan_path(&p));
            let url =
                build_context_inject_url(&endpoint, &projects, plan_path.as_deref(), colors)?;
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    let body = resp.text().await.unwrap_or_default();
                    if !body.trim().is_empty() {
                        println!("{body}");
                    }
                    Ok(())
                }
                Ok(resp) => {
                    // Rejected request: show the worker's message to the
                    // user without injecting anything.
                    let body: serde_json::Value = resp.json().await.unwrap_or_default();
                    if let Some(message) = body.get("error").and_then(|e| e.as_str()) {
                        eprintln!("{message}");
                    }
                    std::process::exit(HOOK_USER_MESSAGE_EXIT_CODE);
                }
                // No worker, no context. The session starts without memory.
                Err(_) => Ok(()),
            }
        }
        HookCommands::Observe => {
            let Some(content_session_id) = content_session_id else {
                return carry_on();
            };
            let req = ObservationIngest {
                content_session_id,
                tool_name: stdin_str(&stdin, &["tool_name"]).unwrap_or_default(),
                tool_input: stdin.get("tool_input").cloned().unwrap_or_default(),
                tool_response: stdin.get("tool_response").cloned().unwrap_or_default(),
                cwd,
                memory_session_id: stdin_str(&stdin, &["memorySessionId"]),
            };
            post_tolerant(&client, &format!("{endpoint}/api/sessions/observations"), &req).await
        }
        HookCommands::Summarize => {
            let Some(content_session_id) = content_session_id else {
                return carry_on();
            };
            let req = SummarizeIngest {
                content_session_id,
                last_assistant_message: stdin_str(&stdin, &["last_assistant_message"])
                    .unwrap_or_default(),
                cwd: Some(cwd),
            };
            post_tolerant(&client, &format!("{endpoint}/api/sessions/summarize"), &req).await
        }
        HookCommands::Prompt => {
            let Some(content_session_id) = content_session_id else {
                return carry_on();
            };
            let req = PromptIngest {
                content_session_id,
                prompt: stdin_str(&stdin, &["prompt"]).unwrap_or_default(),
                cwd: Some(cwd),
            };
            post_tolerant(&client, &format!("{endpoint}/api/sessions/prompts"), &req).await
        }
    }
}

/// POSTs the request; any transport or worker failure degrades to the
/// carry-on reply so the editor continues.
async fn post_tolerant<T: serde::Serialize>(
    client: &reqwest::Client,
    url: &str,
    body: &T,
) -> Result<()> {
    match client.post(url).json(body).send().await {
        Ok(resp) if resp.status().is_success() => {
            println!("{}", serde_json::to_string(&HookReply::carry_on())?);
            Ok(())
        }
        Ok(resp) => {
            tracing::warn!(status = %resp.status(), "worker rejected hook payload");
            carry_on()
        }
        Err(e) => {
            tracing::debug!("worker unreachable: {e}");
            carry_on()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn context_url_percent_encodes_the_plan_path() {
        let url = build_context_inject_url(
            "http://127.0.0.1:41777",
            &["pilot".to_owned()],
            Some("docs/plans/my-plan.md"),
            false,
        )
        .unwrap();
        assert!(url.contains("planPath=docs%2Fplans%2Fmy-plan.md"), "{url}");
        assert!(url.contains("projects=pilot"));
        assert!(!url.contains("colors="));
    }

    #[test]
    fn context_url_without_plan_has_no_plan_param() {
        let url = build_context_inject_url(
            "http://127.0.0.1:41777",
            &["pilot".to_owned()],
            None,
            true,
        )
        .unwrap();
        assert!(!url.contains("planPath="));
        assert!(url.contains("colors=true"));
    }

    #[test]
    fn active_plan_file_resolves_plan_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("active_plan.json");
        std::fs::write(&path, r#"{"plan_path": "docs/plans/my-plan.md", "status": "PENDING"}"#)
            .unwrap();
        assert_eq!(read_active_plan_path(&path).as_deref(), Some("docs/plans/my-plan.md"));
    }

    #[test]
    fn missing_active_plan_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_active_plan_path(&dir.path().join("active_plan.json")).is_none());
    }

    #[test]
    fn malformed_active_plan_file_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("active_plan.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(read_active_plan_path(&path).is_none());
    }
}
