/// Task outcome: the terminal result record for an executed task
///
/// An outcome is written to the result backend exactly once per task ID and
/// retained for a configured TTL. A task with no stored outcome is pending
/// (or expired); that state is represented by absence, not by a variant.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Terminal result of a task execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// Handler completed and returned a value
    Success {
        /// Handler return value
        value: JsonValue,
    },

    /// Handler returned an error; the description is the captured error text
    Failure {
        /// Captured error description
        error: String,
    },
}

impl TaskOutcome {
    /// Creates a success outcome
    pub fn success(value: JsonValue) -> Self {
        TaskOutcome::Success { value }
    }

    /// Creates a failure outcome from any displayable error
    pub fn failure(error: impl ToString) -> Self {
        TaskOutcome::Failure {
            error: error.to_string(),
        }
    }

    /// True if this outcome is a success
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_encoding() {
        let outcome = TaskOutcome::success(json!({"count": 0}));
        let encoded = serde_json::to_string(&outcome).unwrap();

        assert_eq!(encoded, r#"{"status":"success","value":{"count":0}}"#);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_failure_encoding() {
        let outcome = TaskOutcome::failure("handler exploded");
        let encoded = serde_json::to_string(&outcome).unwrap();

        assert_eq!(
            encoded,
            r#"{"status":"failure","error":"handler exploded"}"#
        );
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_decoding() {
        let decoded: TaskOutcome =
            serde_json::from_str(r#"{"status":"success","value":{"count":3}}"#).unwrap();
        assert_eq!(decoded, TaskOutcome::success(json!({"count": 3})));
    }
}
