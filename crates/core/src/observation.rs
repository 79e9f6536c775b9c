//! Observation types for tool-use capture.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod builder;

/// Type of observation captured during a coding session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ObservationType {
    /// Discovery about the codebase or an API
    Discovery,
    /// Bug fix observation
    Bugfix,
    /// New feature implementation
    Feature,
    /// General code change
    Change,
    /// Architectural or design decision
    Decision,
    /// Code refactoring
    Refactor,
}

impl ObservationType {
    /// All known observation types, in dashboard display order.
    pub const ALL: &'static [Self] = &[
        Self::Discovery,
        Self::Bugfix,
        Self::Feature,
        Self::Change,
        Self::Decision,
        Self::Refactor,
    ];

    /// Returns the string representation of the observation type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Discovery => "discovery",
            Self::Bugfix => "bugfix",
            Self::Feature => "feature",
            Self::Change => "change",
            Self::Decision => "decision",
            Self::Refactor => "refactor",
        }
    }
}

impl FromStr for ObservationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discovery" => Ok(Self::Discovery),
            "bugfix" => Ok(Self::Bugfix),
            "feature" => Ok(Self::Feature),
            "change" => Ok(Self::Change),
            "decision" => Ok(Self::Decision),
            "refactor" => Ok(Self::Refactor),
            other => Err(format!("unknown observation type: {other}")),
        }
    }
}

/// Structured observation of one tool use, enriched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Internal database id.
    pub id: i64,
    /// Memory session this observation belongs to.
    pub memory_session_id: String,
    /// Project this observation belongs to.
    pub project: String,
    /// Type of observation.
    pub observation_type: ObservationType,
    /// Concise title.
    pub title: String,
    /// Optional one-line context.
    pub subtitle: Option<String>,
    /// Short explanation of what happened.
    pub narrative: Option<String>,
    /// Specific facts learned, in order.
    pub facts: Vec<String>,
    /// Semantic concept tags (set-valued; stored as a JSON array).
    pub concepts: Vec<String>,
    /// File paths read.
    pub files_read: Vec<String>,
    /// File paths modified.
    pub files_modified: Vec<String>,
    /// Token count this observation saves on re-discovery.
    pub discovery_tokens: i64,
    /// When this observation was created, epoch milliseconds.
    pub created_at_epoch: i64,
}
