//! Text utilities shared across crates.

use std::sync::LazyLock;

use regex::Regex;

static SYSTEM_REMINDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(?is)<system-reminder>.*?</system-reminder>").expect("static regex")
});

/// Strips `<system-reminder>...</system-reminder>` blocks from assistant
/// text before it is stored or rendered.
#[must_use]
pub fn strip_system_reminders(text: &str) -> String {
    SYSTEM_REMINDER_RE.replace_all(text, "").into_owned()
}

/// Strips the absolute project prefix from a file path.
///
/// Removes everything up to and including the first `/<project>/` segment,
/// so stored paths stay portable across checkouts.
#[must_use]
pub fn sanitize_project_path(path: &str, project: &str) -> String {
    if project.is_empty() {
        return path.to_owned();
    }
    let marker = format!("/{project}/");
    match path.find(&marker) {
        Some(idx) => path[idx + marker.len()..].to_owned(),
        None => path.to_owned(),
    }
}

/// Derives the project name from a working directory (its final component).
#[must_use]
pub fn project_from_cwd(cwd: &str) -> String {
    std::path::Path::new(cwd)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Converts a working directory into the transcript directory name used by
/// the editor: `/` becomes `-`.
#[must_use]
pub fn dashed_cwd(cwd: &str) -> String {
    cwd.replace('/', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_reminder_blocks() {
        let input = "Done.<system-reminder>\nnoise\n</system-reminder> Next.";
        assert_eq!(strip_system_reminders(input), "Done. Next.");
    }

    #[test]
    fn strips_multiple_blocks_case_insensitive() {
        let input = "a<SYSTEM-REMINDER>x</SYSTEM-REMINDER>b<system-reminder>y</system-reminder>c";
        assert_eq!(strip_system_reminders(input), "abc");
    }

    #[test]
    fn sanitize_removes_through_project_segment() {
        assert_eq!(
            sanitize_project_path("/home/u/code/pilot/src/main.rs", "pilot"),
            "src/main.rs"
        );
    }

    #[test]
    fn sanitize_leaves_foreign_paths_alone() {
        assert_eq!(sanitize_project_path("/etc/hosts", "pilot"), "/etc/hosts");
    }

    #[test]
    fn project_name_is_cwd_basename() {
        assert_eq!(project_from_cwd("/home/u/code/pilot"), "pilot");
        assert_eq!(project_from_cwd(""), "unknown");
    }

    #[test]
    fn dashed_cwd_replaces_slashes() {
        assert_eq!(dashed_cwd("/home/u/code"), "-home-u-code");
    }
}
