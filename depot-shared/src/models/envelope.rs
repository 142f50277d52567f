/// Task envelope: the immutable unit of work published to the broker
///
/// Redis Streams store entries as field-value string pairs, so the envelope
/// carries its own conversion to and from that format.
///
/// # Format
///
/// Each envelope is stored in a Redis Stream entry with the fields:
/// ```text
/// task_id: "3f1e...-uuid"
/// task_type: "count_items"
/// payload: "{\"user_id\":\"...\"}"
/// published_at: "2026-08-29T12:00:00Z"
/// ```
///
/// # Stream Naming
///
/// Envelopes for a task type live in the stream `tasks:{task_type}`.
/// Ordering is FIFO within one stream; there is no ordering guarantee
/// across task types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

/// Envelope encoding/decoding errors
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// UUID parsing error
    #[error("UUID error: {0}")]
    UuidError(#[from] uuid::Error),

    /// Timestamp parsing error
    #[error("Timestamp error: {0}")]
    TimestampError(String),
}

/// A unit of work published to the task broker
///
/// Once published an envelope is never mutated; re-delivery after a
/// visibility timeout presents the same fields to the next claimant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    /// Generated task ID, used to correlate the stored outcome
    pub task_id: Uuid,

    /// Task-type identifier, resolved to a handler at execution time
    pub task_type: String,

    /// Opaque JSON payload passed to the handler
    pub payload: JsonValue,

    /// When the envelope was published
    pub published_at: DateTime<Utc>,
}

impl TaskEnvelope {
    /// Creates an envelope with a fresh task ID
    pub fn new(task_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            task_type: task_type.into(),
            payload,
            published_at: Utc::now(),
        }
    }

    /// Converts the envelope to Redis Stream field-value pairs for XADD
    pub fn to_fields(&self) -> Result<HashMap<String, String>, EnvelopeError> {
        let mut fields = HashMap::new();

        fields.insert("task_id".to_string(), self.task_id.to_string());
        fields.insert("task_type".to_string(), self.task_type.clone());
        fields.insert(
            "payload".to_string(),
            serde_json::to_string(&self.payload)?,
        );
        fields.insert("published_at".to_string(), self.published_at.to_rfc3339());

        Ok(fields)
    }

    /// Reconstructs an envelope from Redis Stream field-value pairs
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are missing or malformed.
    pub fn from_fields(fields: &HashMap<String, String>) -> Result<Self, EnvelopeError> {
        let task_id = fields
            .get("task_id")
            .ok_or_else(|| EnvelopeError::MissingField("task_id".to_string()))?
            .parse::<Uuid>()?;

        let task_type = fields
            .get("task_type")
            .ok_or_else(|| EnvelopeError::MissingField("task_type".to_string()))?
            .clone();

        let payload: JsonValue = serde_json::from_str(
            fields
                .get("payload")
                .ok_or_else(|| EnvelopeError::MissingField("payload".to_string()))?,
        )?;

        let published_at = fields
            .get("published_at")
            .ok_or_else(|| EnvelopeError::MissingField("published_at".to_string()))?
            .parse::<DateTime<Utc>>()
            .map_err(|e| EnvelopeError::TimestampError(e.to_string()))?;

        Ok(Self {
            task_id,
            task_type,
            payload,
            published_at,
        })
    }
}

/// Returns the Redis Stream key for a task type
///
/// # Example
///
/// ```
/// use depot_shared::models::envelope::task_stream_key;
///
/// assert_eq!(task_stream_key("count_items"), "tasks:count_items");
/// ```
pub fn task_stream_key(task_type: &str) -> String {
    format!("tasks:{}", task_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stream_key_naming() {
        assert_eq!(task_stream_key("count_items"), "tasks:count_items");
        assert_eq!(task_stream_key("sync"), "tasks:sync");
    }

    #[test]
    fn test_envelope_fields_round_trip() {
        let envelope = TaskEnvelope::new("count_items", json!({"user_id": null}));

        let fields = envelope.to_fields().unwrap();
        let decoded = TaskEnvelope::from_fields(&fields).unwrap();

        assert_eq!(decoded.task_id, envelope.task_id);
        assert_eq!(decoded.task_type, "count_items");
        assert_eq!(decoded.payload, envelope.payload);
    }

    #[test]
    fn test_from_fields_missing_task_type() {
        let envelope = TaskEnvelope::new("count_items", json!({}));
        let mut fields = envelope.to_fields().unwrap();
        fields.remove("task_type");

        let err = TaskEnvelope::from_fields(&fields).unwrap_err();
        assert!(matches!(err, EnvelopeError::MissingField(f) if f == "task_type"));
    }

    #[test]
    fn test_from_fields_malformed_task_id() {
        let envelope = TaskEnvelope::new("count_items", json!({}));
        let mut fields = envelope.to_fields().unwrap();
        fields.insert("task_id".to_string(), "not-a-uuid".to_string());

        assert!(TaskEnvelope::from_fields(&fields).is_err());
    }
}
