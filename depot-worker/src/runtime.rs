/// Worker runtime
///
/// The main worker loop. Each iteration claims one envelope from the
/// broker, then executes it on its own Tokio task:
///
/// ```text
/// WorkerRuntime
///   ├─> TaskBroker: claim envelope (consumer group, bounded wait)
///   ├─> PgPool: open transaction scoped to this execution
///   ├─> HandlerRegistry: resolve handler for the envelope's task type
///   ├─> Handler: execute, capture value or error
///   ├─> ResultBackend: store the terminal outcome (write-once)
///   └─> TaskBroker: acknowledge the envelope
/// ```
///
/// Handler failures are terminal: the failure is recorded as the outcome
/// and the envelope is acknowledged anyway; the loop keeps claiming other
/// work. Only a crash before acknowledgment causes redelivery, via the
/// broker's visibility timeout.
///
/// All collaborators are injected at construction. The runtime holds no
/// globals; running several instances against the same consumer group is
/// the intended scale-out path.

use crate::handlers::{HandlerRegistry, TaskContext};
use depot_shared::models::envelope::TaskEnvelope;
use depot_shared::models::outcome::TaskOutcome;
use depot_shared::queue::broker::{BrokerError, Delivery, TaskBroker};
use depot_shared::queue::results::{ResultBackend, ResultError};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Worker runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum number of tasks executing concurrently
    pub max_concurrent_tasks: usize,

    /// Seconds to back off after a broker failure before claiming again
    pub error_backoff_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 10,
            error_backoff_secs: 1,
        }
    }
}

/// Worker runtime: claims, executes, records, acknowledges
pub struct WorkerRuntime {
    pool: PgPool,
    broker: Arc<TaskBroker>,
    results: ResultBackend,
    registry: Arc<HandlerRegistry>,
    config: RuntimeConfig,
    shutdown_token: CancellationToken,
}

impl WorkerRuntime {
    /// Creates a new worker runtime from injected collaborators
    pub fn new(
        pool: PgPool,
        broker: Arc<TaskBroker>,
        results: ResultBackend,
        registry: Arc<HandlerRegistry>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            pool,
            broker,
            results,
            registry,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Gets the shutdown token
    ///
    /// Cancelling it stops the claim loop; in-flight tasks are drained
    /// before `run` returns.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs the worker loop until shutdown
    pub async fn run(&self) -> anyhow::Result<()> {
        let task_types = self.registry.task_types();
        if task_types.is_empty() {
            anyhow::bail!("No task handlers registered");
        }
        let claim_types: Vec<&str> = task_types.iter().map(String::as_str).collect();

        tracing::info!(task_types = ?task_types, "Worker runtime starting");

        let slots = Arc::new(Semaphore::new(self.config.max_concurrent_tasks));

        loop {
            if self.shutdown_token.is_cancelled() {
                break;
            }

            // Holding a permit across claim+execute caps concurrency
            let permit = match slots.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let claimed = tokio::select! {
                claimed = self.broker.claim(&claim_types) => claimed,
                _ = self.shutdown_token.cancelled() => {
                    drop(permit);
                    break;
                }
            };

            match claimed {
                Ok(Some(delivery)) => {
                    let pool = self.pool.clone();
                    let broker = self.broker.clone();
                    let results = self.results.clone();
                    let registry = self.registry.clone();

                    tokio::spawn(async move {
                        if let Err(e) =
                            execute_delivery(pool, broker, results, registry, delivery).await
                        {
                            tracing::error!(error = %e, "Task execution pipeline failed");
                        }
                        drop(permit);
                    });
                }
                Ok(None) => {
                    // Bounded wait expired with no work
                    drop(permit);
                }
                Err(e @ BrokerError::Unavailable(_)) => {
                    drop(permit);
                    tracing::error!(error = %e, "Broker unavailable, backing off");
                    sleep(Duration::from_secs(self.config.error_backoff_secs)).await;
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(error = %e, "Failed to claim task");
                    sleep(Duration::from_secs(self.config.error_backoff_secs)).await;
                }
            }
        }

        // Drain: wait until every permit is back, i.e. all spawned tasks done
        tracing::info!("Shutdown requested, waiting for active tasks to complete");
        let _ = slots
            .acquire_many(self.config.max_concurrent_tasks as u32)
            .await;
        tracing::info!("Worker runtime shut down");

        Ok(())
    }
}

/// Executes one claimed delivery end to end
///
/// Stores the outcome before acknowledging. If the outcome store is
/// unreachable the envelope is left unacknowledged on purpose: the
/// visibility timeout will hand it to another worker rather than lose the
/// result entirely.
async fn execute_delivery(
    pool: PgPool,
    broker: Arc<TaskBroker>,
    results: ResultBackend,
    registry: Arc<HandlerRegistry>,
    delivery: Delivery,
) -> anyhow::Result<()> {
    let task_id = delivery.envelope.task_id;
    let task_type = delivery.envelope.task_type.clone();

    tracing::info!(task_id = %task_id, task_type = %task_type, "Executing task");

    let outcome = match registry.get(&task_type) {
        Some(handler) => run_scoped(&pool, handler.as_ref(), &delivery.envelope).await,
        None => {
            tracing::error!(task_id = %task_id, task_type = %task_type, "No handler registered");
            TaskOutcome::failure(format!("No handler registered for task type: {}", task_type))
        }
    };

    match results.store(task_id, &outcome).await {
        Ok(()) => {}
        Err(ResultError::Duplicate(_)) => {
            // Redelivered envelope whose first execution already recorded an
            // outcome; the earlier record wins.
            tracing::warn!(task_id = %task_id, "Outcome already stored, keeping first record");
        }
        Err(e) => return Err(e.into()),
    }

    broker.acknowledge(&delivery).await?;

    if outcome.is_success() {
        tracing::info!(task_id = %task_id, "Task succeeded");
    } else {
        tracing::warn!(task_id = %task_id, "Task failed");
    }

    Ok(())
}

/// Runs a handler inside a transaction scoped to this execution
///
/// The transaction is the task's scoped resource: committed only when the
/// handler returns a value, rolled back by drop on every other path,
/// including a panic inside the handler.
async fn run_scoped(
    pool: &PgPool,
    handler: &dyn crate::handlers::TaskHandler,
    envelope: &TaskEnvelope,
) -> TaskOutcome {
    let mut tx = match pool.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!(task_id = %envelope.task_id, error = %e, "Failed to open task session");
            return TaskOutcome::failure(format!("Failed to open task session: {}", e));
        }
    };

    let handler_result = {
        let mut ctx = TaskContext::new(envelope.task_id, &envelope.payload, &mut tx);
        handler.run(&mut ctx).await
    };

    match handler_result {
        Ok(value) => match tx.commit().await {
            Ok(()) => TaskOutcome::success(value),
            Err(e) => {
                tracing::error!(task_id = %envelope.task_id, error = %e, "Failed to commit task session");
                TaskOutcome::failure(format!("Failed to commit task session: {}", e))
            }
        },
        Err(e) => {
            // Dropping the transaction rolls it back
            drop(tx);
            tracing::warn!(task_id = %envelope.task_id, error = %e, "Handler returned error");
            TaskOutcome::failure(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_config_default() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_concurrent_tasks, 10);
        assert_eq!(config.error_backoff_secs, 1);
    }

    // End-to-end runtime behavior needs live Postgres and Redis and is
    // covered in tests/worker_flow_tests.rs
}
