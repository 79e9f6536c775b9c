//! Context composition engine.
//!
//! Builds the per-project context document injected into new editor
//! sessions: plan-scoped observation and summary queries, a chronological
//! timeline, token accounting, and Markdown/ANSI rendering.

mod config;
mod engine;
mod render;
mod timeline;
mod tokens;
mod transcript;

pub use config::{ContextConfig, FullObservationField};
pub use engine::{ContextEngine, ContextRequest, RenderMode};
pub use timeline::{build_timeline, TimelineItem};
pub use tokens::TokenEconomics;
pub use transcript::{last_assistant_message, transcript_path};
