/// Builtin task handlers
///
/// Handlers that ship with the worker binary and are registered at startup.

use super::{HandlerError, TaskContext, TaskHandler};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

/// Counts inventory items through the scoped session
///
/// Returns `{"count": N}` where N is the total number of items, or the
/// number owned by `user_id` when the payload names one. Read-only, so it
/// is trivially safe under at-least-once redelivery.
pub struct CountItemsHandler;

#[async_trait]
impl TaskHandler for CountItemsHandler {
    fn task_type(&self) -> &str {
        "count_items"
    }

    async fn run(&self, ctx: &mut TaskContext<'_>) -> Result<JsonValue, HandlerError> {
        let user_id = match ctx.payload().get("user_id") {
            None => None,
            Some(value) if value.is_null() => None,
            Some(value) => Some(
                value
                    .as_str()
                    .and_then(|s| s.parse::<uuid::Uuid>().ok())
                    .ok_or_else(|| {
                        HandlerError::InvalidPayload(format!(
                            "user_id is not a UUID: {}",
                            value
                        ))
                    })?,
            ),
        };

        let (count,): (i64,) = match user_id {
            Some(user_id) => {
                sqlx::query_as("SELECT COUNT(*) FROM items WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_one(ctx.db())
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM items")
                    .fetch_one(ctx.db())
                    .await?
            }
        };

        tracing::debug!(task_id = %ctx.task_id(), count, "Counted items");

        Ok(json!({ "count": count }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_name() {
        assert_eq!(CountItemsHandler.task_type(), "count_items");
    }

    // Execution against a live database is covered in
    // tests/worker_flow_tests.rs
}
