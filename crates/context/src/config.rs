//! Tunables for context composition.

use pilot_mem_core::{
    ObservationType, DEFAULT_FULL_OBSERVATION_COUNT, DEFAULT_OBSERVATION_COUNT,
    DEFAULT_SUMMARY_COUNT, DISCOVERY_TOKEN_BASELINE,
};

/// Which observation field populates the full-detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullObservationField {
    /// The ordered fact list.
    #[default]
    Facts,
    /// The narrative paragraph.
    Narrative,
    /// Narrative, falling back to facts.
    Text,
}

/// Knobs for one context composition.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Total observations loaded (SQL `LIMIT`).
    pub total_observation_count: usize,
    /// Observations rendered in full detail; the rest are one-liners.
    pub full_observation_count: usize,
    /// Summaries merged into the timeline.
    pub total_summary_count: usize,
    /// Observation types included; empty means all.
    pub observation_types: Vec<ObservationType>,
    /// Concept whitelist; empty means all.
    pub concepts: Vec<String>,
    /// Whether the last-session summary block is appended.
    pub show_last_summary: bool,
    /// Whether the "previously" transcript block is appended.
    pub show_previously: bool,
    /// Field used for the full-detail view.
    pub full_observation_field: FullObservationField,
    /// Baseline tokens per observation for the savings figure.
    pub token_baseline: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            total_observation_count: DEFAULT_OBSERVATION_COUNT,
            full_observation_count: DEFAULT_FULL_OBSERVATION_COUNT,
            total_summary_count: DEFAULT_SUMMARY_COUNT,
            observation_types: Vec::new(),
            concepts: Vec::new(),
            show_last_summary: true,
            show_previously: true,
            full_observation_field: FullObservationField::default(),
            token_baseline: DISCOVERY_TOKEN_BASELINE,
        }
    }
}
