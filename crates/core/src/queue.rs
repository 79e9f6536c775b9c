//! Pending-message queue payload envelope.
//!
//! Queue rows carry an opaque JSON blob; this is its schema-versioned shape.
//! Parsing is the consumer's responsibility and failure is a corruption
//! error, never a batch abort.

use serde::{Deserialize, Serialize};

use crate::error::WorkerError;

/// Kind of work a queued payload represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Observation,
    Summary,
    Prompt,
}

/// Schema-versioned envelope stored in the `payload` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuePayload {
    /// Envelope schema version.
    pub v: u32,
    /// What the body describes.
    pub kind: PayloadKind,
    /// Kind-specific body, parsed by the consumer.
    pub body: serde_json::Value,
}

impl QueuePayload {
    /// Current envelope schema version.
    pub const VERSION: u32 = 1;

    /// Wraps a body in a current-version envelope.
    #[must_use]
    pub fn new(kind: PayloadKind, body: serde_json::Value) -> Self {
        Self { v: Self::VERSION, kind, body }
    }
}

/// One durable queue row, parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingMessage {
    /// Monotonic queue row id.
    pub id: i64,
    /// Session database id this message belongs to.
    pub session_db_id: i64,
    /// Parsed payload envelope.
    pub payload: QueuePayload,
    /// When the row was enqueued, epoch milliseconds.
    pub created_at_epoch: i64,
}

/// Parses a raw payload column into an envelope.
///
/// # Errors
/// Returns [`WorkerError::Corruption`] when the blob is not a valid envelope.
pub fn parse_payload(raw: &str) -> Result<QueuePayload, WorkerError> {
    serde_json::from_str(raw)
        .map_err(|e| WorkerError::Corruption(format!("malformed queue payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_envelope() {
        let payload =
            QueuePayload::new(PayloadKind::Observation, serde_json::json!({"tool_name": "Read"}));
        let raw = serde_json::to_string(&payload).unwrap();
        let parsed = parse_payload(&raw).unwrap();
        assert_eq!(parsed.v, QueuePayload::VERSION);
        assert_eq!(parsed.kind, PayloadKind::Observation);
    }

    #[test]
    fn malformed_payload_is_corruption() {
        let err = parse_payload("{not json").unwrap_err();
        assert!(matches!(err, WorkerError::Corruption(_)));
    }
}
