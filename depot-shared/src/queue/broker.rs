/// Task broker backed by Redis Streams
///
/// Producers publish task envelopes with `publish`; workers take them with
/// `claim` and remove them with `acknowledge`. Claim coordination uses a
/// consumer group, so no two workers hold an unacknowledged claim on the
/// same envelope at the same time.
///
/// # Delivery semantics
///
/// At-least-once. A claimed envelope that is not acknowledged within the
/// visibility timeout becomes re-claimable by any worker (XPENDING +
/// XCLAIM). Handlers must therefore tolerate re-execution; that is the
/// caller's contract, not enforced here.
///
/// # Ordering
///
/// FIFO within a single `tasks:{task_type}` stream. No ordering guarantee
/// across task types.
///
/// # Example
///
/// ```no_run
/// use depot_shared::queue::broker::{TaskBroker, TaskBrokerConfig};
/// use depot_shared::queue::client::RedisClient;
/// use serde_json::json;
///
/// # async fn example(client: RedisClient) -> anyhow::Result<()> {
/// let broker = TaskBroker::new(client, TaskBrokerConfig::default());
///
/// let task_id = broker.publish("count_items", json!({})).await?;
/// println!("Published task {}", task_id);
///
/// if let Some(delivery) = broker.claim(&["count_items"]).await? {
///     // ... execute ...
///     broker.acknowledge(&delivery).await?;
/// }
/// # Ok(())
/// # }
/// ```

use crate::config::WorkerSettings;
use crate::models::envelope::{task_stream_key, EnvelopeError, TaskEnvelope};
use crate::queue::client::RedisClient;
use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadOptions, StreamReadReply,
};
use redis::AsyncCommands;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Task broker errors
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The stream store is unreachable; transient, retry with backoff
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// A command was rejected by the stream store
    #[error("Broker command error: {0}")]
    Command(String),

    /// An envelope could not be encoded or decoded
    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
}

impl From<redis::RedisError> for BrokerError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
            BrokerError::Unavailable(err.to_string())
        } else {
            BrokerError::Command(err.to_string())
        }
    }
}

/// Task broker configuration
#[derive(Debug, Clone)]
pub struct TaskBrokerConfig {
    /// Consumer group shared by all workers
    pub consumer_group: String,

    /// Consumer name unique to this broker handle
    pub consumer_name: String,

    /// Milliseconds before an unacknowledged envelope may be reclaimed
    pub visibility_timeout_ms: u64,

    /// Milliseconds a claim attempt blocks waiting for new work
    pub claim_block_ms: u64,
}

impl Default for TaskBrokerConfig {
    fn default() -> Self {
        Self {
            consumer_group: "depot-workers".to_string(),
            consumer_name: format!("worker-{}", Uuid::new_v4()),
            visibility_timeout_ms: 30_000,
            claim_block_ms: 5000,
        }
    }
}

impl TaskBrokerConfig {
    /// Builds a broker configuration from worker settings
    pub fn from_worker_settings(settings: &WorkerSettings) -> Self {
        Self {
            consumer_group: settings.consumer_group.clone(),
            consumer_name: format!("worker-{}", Uuid::new_v4()),
            visibility_timeout_ms: settings.visibility_timeout_secs * 1000,
            claim_block_ms: settings.claim_block_ms,
        }
    }
}

/// An envelope claimed from the broker, not yet acknowledged
///
/// Holds the stream coordinates needed to XACK the entry once the outcome
/// has been recorded.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// The claimed envelope
    pub envelope: TaskEnvelope,

    /// Stream the envelope was read from
    pub stream_key: String,

    /// Redis Stream entry ID, used for acknowledgment
    pub entry_id: String,
}

/// Durable task broker over Redis Streams
pub struct TaskBroker {
    client: RedisClient,
    config: TaskBrokerConfig,

    // Streams whose consumer group has already been created by this handle
    known_groups: Mutex<HashSet<String>>,
}

impl TaskBroker {
    /// Creates a new broker handle
    pub fn new(client: RedisClient, config: TaskBrokerConfig) -> Self {
        Self {
            client,
            config,
            known_groups: Mutex::new(HashSet::new()),
        }
    }

    /// Gets the broker configuration
    pub fn config(&self) -> &TaskBrokerConfig {
        &self.config
    }

    /// Publishes a task envelope to the stream for its task type
    ///
    /// Appends the envelope with XADD; entries within one stream are
    /// delivered FIFO.
    ///
    /// # Returns
    ///
    /// The generated task ID, used later to fetch the stored outcome.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Unavailable` if Redis is unreachable. Callers
    /// treat this as transient and retry with backoff.
    pub async fn publish(
        &self,
        task_type: &str,
        payload: serde_json::Value,
    ) -> Result<Uuid, BrokerError> {
        let envelope = TaskEnvelope::new(task_type, payload);
        let fields = envelope.to_fields()?;
        let stream_key = task_stream_key(task_type);

        let items: Vec<(&str, &str)> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut conn = self.client.get_connection();
        let entry_id: String = conn.xadd(&stream_key, "*", &items).await?;

        tracing::debug!(
            task_id = %envelope.task_id,
            task_type = %task_type,
            entry_id = %entry_id,
            "Published task envelope"
        );

        Ok(envelope.task_id)
    }

    /// Claims one envelope from the streams of the given task types
    ///
    /// Reclaims envelopes whose previous claimant went silent past the
    /// visibility timeout before asking for new work, then blocks up to the
    /// configured wait for a fresh entry.
    ///
    /// # Returns
    ///
    /// `None` if the bounded wait expired with no work available.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Unavailable` if Redis is unreachable.
    pub async fn claim(&self, task_types: &[&str]) -> Result<Option<Delivery>, BrokerError> {
        if task_types.is_empty() {
            return Ok(None);
        }

        let stream_keys: Vec<String> = task_types.iter().map(|t| task_stream_key(t)).collect();

        for key in &stream_keys {
            self.ensure_group(key).await?;
        }

        // Stale pending entries first, so crashed claims are not starved by
        // a busy stream.
        for key in &stream_keys {
            if let Some(delivery) = self.reclaim_expired(key).await? {
                return Ok(Some(delivery));
            }
        }

        self.read_new(&stream_keys).await
    }

    /// Acknowledges a delivery, removing it from the pending entries list
    ///
    /// After acknowledgment the envelope can never be re-delivered.
    pub async fn acknowledge(&self, delivery: &Delivery) -> Result<(), BrokerError> {
        let mut conn = self.client.get_connection();

        let _: i64 = conn
            .xack(
                &delivery.stream_key,
                &self.config.consumer_group,
                &[&delivery.entry_id],
            )
            .await?;

        tracing::debug!(
            task_id = %delivery.envelope.task_id,
            entry_id = %delivery.entry_id,
            "Acknowledged task envelope"
        );

        Ok(())
    }

    /// Creates the consumer group for a stream if it doesn't exist yet
    async fn ensure_group(&self, stream_key: &str) -> Result<(), BrokerError> {
        {
            let known = self.known_groups.lock().unwrap();
            if known.contains(stream_key) {
                return Ok(());
            }
        }

        let mut conn = self.client.get_connection();
        let result: Result<String, redis::RedisError> = conn
            .xgroup_create_mkstream(stream_key, &self.config.consumer_group, "0")
            .await;

        match result {
            Ok(_) => {
                tracing::info!(
                    stream_key = %stream_key,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
            }
            // Another worker created the group first
            Err(e) if e.to_string().contains("BUSYGROUP") => {}
            Err(e) => return Err(e.into()),
        }

        self.known_groups
            .lock()
            .unwrap()
            .insert(stream_key.to_string());
        Ok(())
    }

    /// Reclaims one entry pending longer than the visibility timeout
    async fn reclaim_expired(&self, stream_key: &str) -> Result<Option<Delivery>, BrokerError> {
        let mut conn = self.client.get_connection();

        let pending: StreamPendingCountReply = conn
            .xpending_count(stream_key, &self.config.consumer_group, "-", "+", 10usize)
            .await?;

        for entry in &pending.ids {
            if (entry.last_delivered_ms as u64) < self.config.visibility_timeout_ms {
                continue;
            }

            let claimed: StreamClaimReply = conn
                .xclaim(
                    stream_key,
                    &self.config.consumer_group,
                    &self.config.consumer_name,
                    self.config.visibility_timeout_ms as usize,
                    &[&entry.id],
                )
                .await?;

            // XCLAIM returns nothing if another worker won the race
            if let Some(id) = claimed.ids.into_iter().next() {
                let delivery = self.decode_entry(stream_key, id)?;
                tracing::warn!(
                    task_id = %delivery.envelope.task_id,
                    idle_ms = entry.last_delivered_ms,
                    times_delivered = entry.times_delivered,
                    "Reclaimed envelope past visibility timeout"
                );
                return Ok(Some(delivery));
            }
        }

        Ok(None)
    }

    /// Blocks for one new entry across the given streams
    async fn read_new(&self, stream_keys: &[String]) -> Result<Option<Delivery>, BrokerError> {
        let mut conn = self.client.get_connection();

        let opts = StreamReadOptions::default()
            .group(&self.config.consumer_group, &self.config.consumer_name)
            .count(1)
            .block(self.config.claim_block_ms as usize);

        let ids: Vec<&str> = stream_keys.iter().map(|_| ">").collect();
        let reply: StreamReadReply = conn.xread_options(stream_keys, &ids, &opts).await?;

        for stream in reply.keys {
            if let Some(id) = stream.ids.into_iter().next() {
                return Ok(Some(self.decode_entry(&stream.key, id)?));
            }
        }

        Ok(None)
    }

    /// Decodes a stream entry into a delivery
    fn decode_entry(&self, stream_key: &str, entry: StreamId) -> Result<Delivery, BrokerError> {
        let mut fields: HashMap<String, String> = HashMap::new();
        for (key, value) in &entry.map {
            let value: String = redis::from_redis_value(value)
                .map_err(|e| BrokerError::Command(format!("Non-string stream field: {}", e)))?;
            fields.insert(key.clone(), value);
        }

        let envelope = TaskEnvelope::from_fields(&fields)?;

        Ok(Delivery {
            envelope,
            stream_key: stream_key.to_string(),
            entry_id: entry.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_worker_settings() {
        let settings = WorkerSettings::default();
        let config = TaskBrokerConfig::from_worker_settings(&settings);

        assert_eq!(config.consumer_group, "depot-workers");
        assert_eq!(config.visibility_timeout_ms, 30_000);
        assert_eq!(config.claim_block_ms, 5000);
        assert!(config.consumer_name.starts_with("worker-"));
    }

    #[test]
    fn test_consumer_names_are_unique() {
        let a = TaskBrokerConfig::default();
        let b = TaskBrokerConfig::default();
        assert_ne!(a.consumer_name, b.consumer_name);
    }

    // Integration tests against a live Redis are in tests/broker_tests.rs
}
