//! The context composition algorithm.

use std::collections::HashSet;

use anyhow::Result;

use pilot_mem_core::{Observation, SessionSummary};
use pilot_mem_storage::Store;

use crate::config::ContextConfig;
use crate::render::{render, render_empty, RenderInput};
use crate::timeline::build_timeline;
use crate::tokens::TokenEconomics;
use crate::transcript::{last_assistant_message, transcript_path};

/// Output flavor of the rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Plain Markdown.
    Markdown,
    /// ANSI-colored terminal output.
    Ansi,
}

/// One context composition request.
#[derive(Debug, Clone)]
pub struct ContextRequest {
    /// Projects to draw memory from.
    pub projects: Vec<String>,
    /// Current session's memory id, excluded from the "previously" lookup.
    pub current_session_id: Option<String>,
    /// Working directory, used for transcript path derivation.
    pub current_cwd: Option<String>,
    /// Plan scope; `None` composes unscoped.
    pub plan_path: Option<String>,
    /// Output flavor.
    pub render_mode: RenderMode,
}

/// Composes context documents from the store.
pub struct ContextEngine {
    store: Store,
    config: ContextConfig,
}

impl ContextEngine {
    #[must_use]
    pub fn new(store: Store, config: ContextConfig) -> Self {
        Self { store, config }
    }

    /// Composes the context document for a request.
    ///
    /// Performs blocking store and file reads; callers on the event loop
    /// wrap this in `spawn_blocking`.
    pub fn compose(&self, request: &ContextRequest) -> Result<String> {
        let mut observations: Vec<Observation> = Vec::new();
        let mut summaries: Vec<SessionSummary> = Vec::new();

        for project in &request.projects {
            let mut obs = match request.plan_path.as_deref() {
                Some(plan) => self.store.query_observations_excluding_other_plans(
                    project,
                    plan,
                    &self.config.observation_types,
                    &self.config.concepts,
                    self.config.total_observation_count,
                )?,
                None => self.store.query_observations(
                    project,
                    &self.config.observation_types,
                    &self.config.concepts,
                    self.config.total_observation_count,
                )?,
            };
            observations.append(&mut obs);

            let mut sums = match request.plan_path.as_deref() {
                Some(plan) => self.store.get_recent_summaries_excluding_other_plans(
                    project,
                    plan,
                    self.config.total_summary_count,
                )?,
                None => {
                    self.store.get_recent_summaries(project, self.config.total_summary_count)?
                }
            };
            summaries.append(&mut sums);
        }

        if observations.is_empty() && summaries.is_empty() {
            return Ok(render_empty(&request.projects, request.render_mode));
        }

        // Cap across projects; queries come back newest first.
        observations.sort_by_key(|o| (std::cmp::Reverse(o.created_at_epoch), o.id));
        observations.truncate(self.config.total_observation_count);
        summaries.sort_by_key(|s| (std::cmp::Reverse(s.created_at_epoch), s.id));
        summaries.truncate(self.config.total_summary_count);

        let economics = TokenEconomics::compute(&observations, self.config.token_baseline);
        let timeline = build_timeline(&summaries, &observations);

        // The newest N observations get the full-detail rendering.
        let full_ids: HashSet<i64> = observations
            .iter()
            .take(self.config.full_observation_count)
            .map(|o| o.id)
            .collect();

        let last_summary = self.config.show_last_summary.then(|| summaries.first()).flatten();
        let previously = if self.config.show_previously {
            self.read_previously(request, &summaries)
        } else {
            None
        };

        Ok(render(
            &RenderInput {
                projects: &request.projects,
                economics,
                timeline: &timeline,
                full_ids: &full_ids,
                last_summary,
                previously: previously.as_deref(),
                config: &self.config,
            },
            request.render_mode,
        ))
    }

    /// Reads the last assistant message from a prior session's transcript.
    /// Any failure is an empty section.
    fn read_previously(
        &self,
        request: &ContextRequest,
        summaries: &[SessionSummary],
    ) -> Option<String> {
        let cwd = request.current_cwd.as_deref()?;
        let prior = summaries
            .iter()
            .find(|s| Some(s.memory_session_id.as_str()) != request.current_session_id.as_deref())?;
        let path = transcript_path(cwd, &prior.memory_session_id)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %path.display(), "no transcript to read: {e}");
                return None;
            }
        };
        last_assistant_message(&content)
    }
}
