/// Result backend: write-once task outcome store with expiry
///
/// Outcomes live under `task-result:{task_id}` with a TTL, written with
/// `SET NX EX` so a recorded outcome can never be silently overwritten.
/// Producers poll with `wait_for` after publishing; an outcome that never
/// appears within their deadline is a timeout, distinct from a task that
/// ran and failed.
///
/// # Example
///
/// ```no_run
/// use depot_shared::models::outcome::TaskOutcome;
/// use depot_shared::queue::client::RedisClient;
/// use depot_shared::queue::results::ResultBackend;
/// use std::time::Duration;
/// use uuid::Uuid;
///
/// # async fn example(client: RedisClient, task_id: Uuid) -> anyhow::Result<()> {
/// let backend = ResultBackend::new(client, Duration::from_secs(3600));
///
/// let outcome = backend
///     .wait_for(task_id, Duration::from_secs(10))
///     .await?;
/// println!("Task finished: success={}", outcome.is_success());
/// # Ok(())
/// # }
/// ```

use crate::models::outcome::TaskOutcome;
use crate::queue::client::RedisClient;
use redis::AsyncCommands;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

/// Result backend errors
#[derive(Error, Debug)]
pub enum ResultError {
    /// An outcome was already stored for this task ID
    #[error("Outcome already stored for task {0}")]
    Duplicate(Uuid),

    /// No outcome appeared within the caller's deadline
    #[error("No outcome for task {0} within the deadline")]
    Timeout(Uuid),

    /// The result store is unreachable; transient, retry with backoff
    #[error("Result store unavailable: {0}")]
    Unavailable(String),

    /// A command was rejected by the result store
    #[error("Result store command error: {0}")]
    Command(String),

    /// A stored outcome could not be encoded or decoded
    #[error("Outcome encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<redis::RedisError> for ResultError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
            ResultError::Unavailable(err.to_string())
        } else {
            ResultError::Command(err.to_string())
        }
    }
}

/// Returns the Redis key holding a task's outcome
pub fn result_key(task_id: Uuid) -> String {
    format!("task-result:{}", task_id)
}

/// Durable key-value outcome store with per-key expiry
#[derive(Clone)]
pub struct ResultBackend {
    client: RedisClient,
    ttl: Duration,
    poll_interval: Duration,
}

impl ResultBackend {
    /// Creates a new result backend
    ///
    /// # Arguments
    ///
    /// * `client` - Redis client
    /// * `ttl` - Retention window for stored outcomes; entries expire after
    ///   this duration even if never read
    pub fn new(client: RedisClient, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            poll_interval: Duration::from_millis(100),
        }
    }

    /// Gets the configured retention window
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Stores a terminal outcome for a task, exactly once
    ///
    /// # Errors
    ///
    /// Returns `ResultError::Duplicate` if an outcome already exists for
    /// this task ID; the previously recorded outcome is left intact. The
    /// worker runtime treats that as a redelivery artifact and logs it;
    /// anywhere else it is a contract violation.
    pub async fn store(&self, task_id: Uuid, outcome: &TaskOutcome) -> Result<(), ResultError> {
        let key = result_key(task_id);
        let encoded = serde_json::to_string(outcome)?;
        let mut conn = self.client.get_connection();

        // SET NX EX: first writer wins, later writers see Nil
        let stored: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&encoded)
            .arg("NX")
            .arg("EX")
            .arg(self.ttl.as_secs())
            .query_async(&mut conn)
            .await?;

        if stored.is_none() {
            return Err(ResultError::Duplicate(task_id));
        }

        tracing::debug!(
            task_id = %task_id,
            success = outcome.is_success(),
            ttl_secs = self.ttl.as_secs(),
            "Stored task outcome"
        );

        Ok(())
    }

    /// Fetches the stored outcome for a task
    ///
    /// # Returns
    ///
    /// `None` if no outcome has been stored yet or the entry has expired.
    pub async fn fetch(&self, task_id: Uuid) -> Result<Option<TaskOutcome>, ResultError> {
        let mut conn = self.client.get_connection();

        let raw: Option<String> = conn.get(result_key(task_id)).await?;

        match raw {
            Some(encoded) => Ok(Some(serde_json::from_str(&encoded)?)),
            None => Ok(None),
        }
    }

    /// Polls for an outcome until it appears or the deadline passes
    ///
    /// A crash between result-write and broker-ack can leave an outcome
    /// absent for an acknowledged task; this timeout is how callers bound
    /// that wait.
    ///
    /// # Errors
    ///
    /// Returns `ResultError::Timeout` if no outcome appears in time.
    pub async fn wait_for(
        &self,
        task_id: Uuid,
        timeout: Duration,
    ) -> Result<TaskOutcome, ResultError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(outcome) = self.fetch(task_id).await? {
                return Ok(outcome);
            }

            if Instant::now() >= deadline {
                return Err(ResultError::Timeout(task_id));
            }

            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_key_naming() {
        let id = Uuid::nil();
        assert_eq!(
            result_key(id),
            "task-result:00000000-0000-0000-0000-000000000000"
        );
    }

    // Write-once and expiry behavior need a live Redis and are covered in
    // tests/broker_tests.rs
}
