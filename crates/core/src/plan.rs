//! Plan association and plan-file types.
//!
//! A plan is a Markdown file under `<projectRoot>/docs/plans/`; a session may
//! be associated with exactly one plan. Sessions with no association are
//! "quick mode" and visible from every plan-scoped query.

use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::WorkerError;

/// Status of a plan associated with a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum PlanStatus {
    /// Work not yet complete.
    Pending,
    /// All tasks finished.
    Complete,
    /// Finished and verified.
    Verified,
}

impl PlanStatus {
    /// Returns the string representation stored in the database.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Pending => "PENDING",
            Self::Complete => "COMPLETE",
            Self::Verified => "VERIFIED",
        }
    }
}

impl FromStr for PlanStatus {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETE" => Ok(Self::Complete),
            "VERIFIED" => Ok(Self::Verified),
            _ => Err(WorkerError::ContractViolation(format!(
                "invalid plan status '{s}' (must be PENDING|COMPLETE|VERIFIED)"
            ))),
        }
    }
}

/// 1:1 association from a session to a plan file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPlan {
    /// Session database id (primary key; cascades on session delete).
    pub session_db_id: i64,
    /// Plan file path relative to the project root.
    pub plan_path: String,
    /// Current plan status.
    pub plan_status: PlanStatus,
    /// When the association was created, epoch milliseconds.
    pub created_at_epoch: i64,
    /// When the association was last updated, epoch milliseconds.
    pub updated_at_epoch: i64,
}

/// Metadata parsed from a plan file's headers and task checkboxes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanFileInfo {
    /// Path of the plan file.
    pub path: String,
    /// `Status:` header value, if present.
    pub status: Option<String>,
    /// `Approved:` header value, if present.
    pub approved: Option<String>,
    /// `Iterations:` header value, if present.
    pub iterations: Option<u32>,
    /// Count of checked `- [x] Task N:` lines.
    pub tasks_done: u32,
    /// Total count of task lines, checked or not.
    pub tasks_total: u32,
}

static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Status:\s*(.+?)\s*$").expect("static regex"));
static APPROVED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Approved:\s*(.+?)\s*$").expect("static regex"));
static ITERATIONS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^Iterations:\s*(\d+)").expect("static regex"));
static TASK_DONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^- \[x\] Task \d+:").expect("static regex"));
static TASK_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^- \[ \] Task \d+:").expect("static regex"));

/// Parses plan headers and task counts out of a plan file's content.
#[must_use]
pub fn parse_plan_file(path: &str, content: &str) -> PlanFileInfo {
    let capture = |re: &Regex| re.captures(content).map(|c| c[1].to_owned());
    let tasks_done = TASK_DONE_RE.find_iter(content).count() as u32;
    let tasks_open = TASK_OPEN_RE.find_iter(content).count() as u32;
    PlanFileInfo {
        path: path.to_owned(),
        status: capture(&STATUS_RE),
        approved: capture(&APPROVED_RE),
        iterations: ITERATIONS_RE
            .captures(content)
            .and_then(|c| c[1].parse().ok()),
        tasks_done,
        tasks_total: tasks_done + tasks_open,
    }
}

/// Resolves a requested plan path against the plans directory.
///
/// Returns the normalized absolute path only if it is a descendant of
/// `plans_dir` and carries a `.md` suffix. Relative requests resolve against
/// `project_root`. `..` components are normalized lexically, so a traversal
/// attempt cannot escape even when the target does not exist yet.
#[must_use]
pub fn resolve_plan_path(project_root: &Path, requested: &str) -> Option<PathBuf> {
    let requested = Path::new(requested);
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        project_root.join(requested)
    };
    let resolved = normalize(&joined);
    let plans_dir = normalize(&project_root.join("docs").join("plans"));
    if resolved.starts_with(&plans_dir) && resolved.extension().is_some_and(|e| e == "md") {
        Some(resolved)
    } else {
        None
    }
}

/// Lexical normalization: resolves `.` and `..` without touching the
/// filesystem, so missing files can still be judged.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = "# My plan\n\nStatus: In progress\nApproved: yes\nIterations: 3\n\n\
                        - [x] Task 1: scaffold\n- [x] Task 2: wire routes\n- [ ] Task 3: tests\n";

    #[test]
    fn parses_headers_and_tasks() {
        let info = parse_plan_file("docs/plans/my-plan.md", PLAN);
        assert_eq!(info.status.as_deref(), Some("In progress"));
        assert_eq!(info.approved.as_deref(), Some("yes"));
        assert_eq!(info.iterations, Some(3));
        assert_eq!(info.tasks_done, 2);
        assert_eq!(info.tasks_total, 3);
    }

    #[test]
    fn missing_headers_are_none() {
        let info = parse_plan_file("p.md", "just text");
        assert!(info.status.is_none());
        assert_eq!(info.tasks_total, 0);
    }

    #[test]
    fn plan_status_rejects_lowercase() {
        assert!("pending".parse::<PlanStatus>().is_err());
        assert_eq!("VERIFIED".parse::<PlanStatus>().unwrap(), PlanStatus::Verified);
    }

    #[test]
    fn resolve_accepts_relative_plan() {
        let root = Path::new("/repo");
        let p = resolve_plan_path(root, "docs/plans/a.md").unwrap();
        assert_eq!(p, Path::new("/repo/docs/plans/a.md"));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let root = Path::new("/repo");
        assert!(resolve_plan_path(root, "docs/plans/../../etc/passwd").is_none());
        assert!(resolve_plan_path(root, "../outside/docs/plans/a.md").is_none());
        assert!(resolve_plan_path(root, "/etc/passwd").is_none());
    }

    #[test]
    fn resolve_rejects_non_markdown() {
        let root = Path::new("/repo");
        assert!(resolve_plan_path(root, "docs/plans/a.txt").is_none());
        assert!(resolve_plan_path(root, "docs/plans/a").is_none());
    }

    #[test]
    fn resolve_rejects_sneaky_dotdot_inside() {
        let root = Path::new("/repo");
        // Normalizes back inside the plans dir: allowed.
        assert!(resolve_plan_path(root, "docs/plans/sub/../a.md").is_some());
        // Escapes the plans dir even though it re-enters docs: rejected.
        assert!(resolve_plan_path(root, "docs/plans/../other/a.md").is_none());
    }
}
