//! Markdown and ANSI renderers for the context document.
//!
//! Both emit the same logical sections; ANSI only adds color.

use std::collections::HashSet;
use std::fmt::Write as _;

use pilot_mem_core::{iso_from_epoch_ms, Observation, SessionSummary};

use crate::config::{ContextConfig, FullObservationField};
use crate::engine::RenderMode;
use crate::timeline::TimelineItem;
use crate::tokens::TokenEconomics;

const CYAN: &str = "\u{1b}[0;36m";
const GREEN: &str = "\u{1b}[0;32m";
const YELLOW: &str = "\u{1b}[0;33m";
const NC: &str = "\u{1b}[0m";

pub(crate) struct RenderInput<'a> {
    pub projects: &'a [String],
    pub economics: TokenEconomics,
    pub timeline: &'a [TimelineItem],
    /// Observation ids rendered in full detail.
    pub full_ids: &'a HashSet<i64>,
    pub last_summary: Option<&'a SessionSummary>,
    pub previously: Option<&'a str>,
    pub config: &'a ContextConfig,
}

/// The fixed template emitted when no observations or summaries exist.
pub(crate) fn render_empty(projects: &[String], mode: RenderMode) -> String {
    let joined = projects.join(", ");
    match mode {
        RenderMode::Markdown => format!(
            "# Project memory: {joined}\n\nNo memory recorded yet. \
             Observations will appear here after the first tool use.\n"
        ),
        RenderMode::Ansi => format!(
            "{CYAN}Project memory: {joined}{NC}\n\nNo memory recorded yet. \
             Observations will appear here after the first tool use.\n"
        ),
    }
}

pub(crate) fn render(input: &RenderInput<'_>, mode: RenderMode) -> String {
    let mut out = String::new();
    header(&mut out, input, mode);
    timeline(&mut out, input, mode);
    if let Some(summary) = input.last_summary {
        last_session(&mut out, summary, mode);
    }
    if let Some(text) = input.previously {
        previously(&mut out, text, mode);
    }
    out
}

fn header(out: &mut String, input: &RenderInput<'_>, mode: RenderMode) {
    let joined = input.projects.join(", ");
    let observation_count = input
        .timeline
        .iter()
        .filter(|i| matches!(i, TimelineItem::Observation { .. }))
        .count();
    let summary_count = input.timeline.len() - observation_count;
    match mode {
        RenderMode::Markdown => {
            let _ = writeln!(out, "# Project memory: {joined}\n");
        }
        RenderMode::Ansi => {
            let _ = writeln!(out, "{CYAN}Project memory: {joined}{NC}\n");
        }
    }
    let _ = writeln!(
        out,
        "{observation_count} observations, {summary_count} session summaries, \
         ~{} tokens saved vs. rediscovery\n",
        input.economics.saved()
    );
}

fn timeline(out: &mut String, input: &RenderInput<'_>, mode: RenderMode) {
    section_title(out, "Timeline", mode);
    for item in input.timeline {
        match item {
            TimelineItem::Summary { summary, .. } => summary_entry(out, summary, mode),
            TimelineItem::Observation { observation, .. } => {
                if input.full_ids.contains(&observation.id) {
                    full_observation(out, observation, input.config, mode);
                } else {
                    brief_observation(out, observation, mode);
                }
            }
        }
    }
    out.push('\n');
}

fn summary_entry(out: &mut String, summary: &SessionSummary, mode: RenderMode) {
    let date = iso_from_epoch_ms(summary.created_at_epoch);
    let request = summary.request.as_deref().unwrap_or("(no request recorded)");
    match mode {
        RenderMode::Markdown => {
            let _ = writeln!(out, "- **Session** ({date}): {request}");
        }
        RenderMode::Ansi => {
            let _ = writeln!(out, "{GREEN}* Session ({date}):{NC} {request}");
        }
    }
    for (label, value) in [
        ("learned", summary.learned.as_deref()),
        ("completed", summary.completed.as_deref()),
        ("next steps", summary.next_steps.as_deref()),
    ] {
        if let Some(value) = value {
            let _ = writeln!(out, "    {label}: {value}");
        }
    }
}

fn brief_observation(out: &mut String, obs: &Observation, mode: RenderMode) {
    let date = iso_from_epoch_ms(obs.created_at_epoch);
    match mode {
        RenderMode::Markdown => {
            let _ = writeln!(out, "- [{}] {} ({date})", obs.observation_type.as_str(), obs.title);
        }
        RenderMode::Ansi => {
            let _ = writeln!(
                out,
                "{YELLOW}[{}]{NC} {} ({date})",
                obs.observation_type.as_str(),
                obs.title
            );
        }
    }
}

fn full_observation(
    out: &mut String,
    obs: &Observation,
    config: &ContextConfig,
    mode: RenderMode,
) {
    brief_observation(out, obs, mode);
    if let Some(subtitle) = obs.subtitle.as_deref() {
        let _ = writeln!(out, "    {subtitle}");
    }
    let narrative = obs.narrative.as_deref().filter(|n| !n.is_empty());
    match config.full_observation_field {
        FullObservationField::Facts => facts(out, obs),
        FullObservationField::Narrative => {
            if let Some(narrative) = narrative {
                let _ = writeln!(out, "    {narrative}");
            }
        }
        FullObservationField::Text => {
            if let Some(narrative) = narrative {
                let _ = writeln!(out, "    {narrative}");
            } else {
                facts(out, obs);
            }
        }
    }
}

fn facts(out: &mut String, obs: &Observation) {
    for fact in &obs.facts {
        let _ = writeln!(out, "    - {fact}");
    }
}

fn last_session(out: &mut String, summary: &SessionSummary, mode: RenderMode) {
    section_title(out, "Last session", mode);
    for (label, value) in [
        ("Request", summary.request.as_deref()),
        ("Investigated", summary.investigated.as_deref()),
        ("Learned", summary.learned.as_deref()),
        ("Completed", summary.completed.as_deref()),
        ("Next steps", summary.next_steps.as_deref()),
    ] {
        if let Some(value) = value {
            let _ = writeln!(out, "{label}: {value}");
        }
    }
    out.push('\n');
}

fn previously(out: &mut String, text: &str, mode: RenderMode) {
    section_title(out, "Previously", mode);
    for line in text.lines() {
        let _ = writeln!(out, "> {line}");
    }
    out.push('\n');
}

fn section_title(out: &mut String, title: &str, mode: RenderMode) {
    match mode {
        RenderMode::Markdown => {
            let _ = writeln!(out, "## {title}\n");
        }
        RenderMode::Ansi => {
            let _ = writeln!(out, "{CYAN}== {title} =={NC}\n");
        }
    }
}
