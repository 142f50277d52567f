/// Task handler contract and registry
///
/// A handler executes one task type. It receives a `TaskContext` carrying
/// the envelope's payload and a database session scoped to this single
/// execution: the runtime opens a transaction before invoking the handler,
/// commits it if the handler succeeds, and rolls it back on any error. The
/// handler never manages the session's lifetime itself.
///
/// Handlers may be re-invoked for the same task if a previous claimant
/// crashed before acknowledging, so they must be idempotent or
/// side-effect-tolerant.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use depot_worker::handlers::{HandlerError, TaskContext, TaskHandler};
/// use serde_json::{json, Value as JsonValue};
///
/// struct Noop;
///
/// #[async_trait]
/// impl TaskHandler for Noop {
///     fn task_type(&self) -> &str {
///         "noop"
///     }
///
///     async fn run(&self, _ctx: &mut TaskContext<'_>) -> Result<JsonValue, HandlerError> {
///         Ok(json!({}))
///     }
/// }
/// ```

pub mod builtin;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use builtin::CountItemsHandler;

/// Handler error types
///
/// All variants are terminal: the runtime records them as a failure outcome
/// and moves on. Retrying is the producer's decision, by re-publishing.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Task execution failed
    #[error("Task execution failed: {0}")]
    ExecutionFailed(String),

    /// The payload did not have the shape this handler expects
    #[error("Invalid task payload: {0}")]
    InvalidPayload(String),

    /// Database error inside the scoped session
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Execution context for a single task
///
/// Borrows the scoped database session for the duration of one handler
/// invocation; the runtime owns the transaction around it.
pub struct TaskContext<'a> {
    task_id: Uuid,
    payload: &'a JsonValue,
    db: &'a mut PgConnection,
}

impl<'a> TaskContext<'a> {
    /// Creates a context for one handler invocation
    pub fn new(task_id: Uuid, payload: &'a JsonValue, db: &'a mut PgConnection) -> Self {
        Self {
            task_id,
            payload,
            db,
        }
    }

    /// The ID of the task being executed
    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// The envelope's opaque payload
    pub fn payload(&self) -> &JsonValue {
        self.payload
    }

    /// The database session scoped to this execution
    pub fn db(&mut self) -> &mut PgConnection {
        self.db
    }
}

/// Contract implemented by every task handler
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// The task-type identifier this handler executes
    fn task_type(&self) -> &str;

    /// Executes the task, returning the value recorded as the outcome
    async fn run(&self, ctx: &mut TaskContext<'_>) -> Result<JsonValue, HandlerError>;
}

/// Registry of handlers, keyed by task type
///
/// Populated once at startup; the worker claims only from the streams of
/// the task types registered here.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its task type
    ///
    /// A later registration for the same task type replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        let task_type = handler.task_type().to_string();
        tracing::info!(task_type = %task_type, "Registering task handler");
        self.handlers.insert(task_type, handler);
    }

    /// Looks up the handler for a task type
    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    /// All registered task types
    pub fn task_types(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl TaskHandler for Noop {
        fn task_type(&self) -> &str {
            "noop"
        }

        async fn run(&self, _ctx: &mut TaskContext<'_>) -> Result<JsonValue, HandlerError> {
            Ok(json!({}))
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(Noop));

        assert!(registry.get("noop").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.task_types(), vec!["noop".to_string()]);
    }

    #[test]
    fn test_registry_replaces_on_duplicate_type() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(Noop));
        registry.register(Arc::new(Noop));

        assert_eq!(registry.task_types().len(), 1);
    }
}
