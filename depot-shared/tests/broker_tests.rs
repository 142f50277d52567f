/// Integration tests for the task broker and result backend
///
/// These tests require a running Redis instance.
/// Run with: cargo test --test broker_tests -- --ignored
///
/// Redis URL is taken from the REDIS_URL environment variable.

use depot_shared::config::RedisSettings;
use depot_shared::models::outcome::TaskOutcome;
use depot_shared::queue::broker::{TaskBroker, TaskBrokerConfig};
use depot_shared::queue::client::RedisClient;
use depot_shared::queue::results::{ResultBackend, ResultError};
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

async fn test_client() -> RedisClient {
    let settings = RedisSettings {
        url: std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
        command_timeout_secs: 10,
    };

    RedisClient::new(settings).await.expect("Failed to connect to Redis")
}

/// Unique task type per test so streams and groups don't interfere
fn unique_task_type(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn short_wait_config(visibility_timeout_ms: u64) -> TaskBrokerConfig {
    TaskBrokerConfig {
        visibility_timeout_ms,
        claim_block_ms: 200,
        ..TaskBrokerConfig::default()
    }
}

#[tokio::test]
#[ignore] // Requires running Redis instance
async fn test_publish_claim_acknowledge_round() {
    let client = test_client().await;
    let broker = TaskBroker::new(client, short_wait_config(30_000));
    let task_type = unique_task_type("round");

    let task_id = broker
        .publish(&task_type, json!({"n": 1}))
        .await
        .expect("publish failed");

    let delivery = broker
        .claim(&[&task_type])
        .await
        .expect("claim failed")
        .expect("expected a delivery");

    assert_eq!(delivery.envelope.task_id, task_id);
    assert_eq!(delivery.envelope.task_type, task_type);
    assert_eq!(delivery.envelope.payload, json!({"n": 1}));

    broker.acknowledge(&delivery).await.expect("ack failed");

    // Nothing left to claim
    let next = broker.claim(&[&task_type]).await.expect("claim failed");
    assert!(next.is_none());
}

#[tokio::test]
#[ignore] // Requires running Redis instance
async fn test_fifo_within_one_stream() {
    let client = test_client().await;
    let broker = TaskBroker::new(client, short_wait_config(30_000));
    let task_type = unique_task_type("fifo");

    let first = broker.publish(&task_type, json!({"seq": 1})).await.unwrap();
    let second = broker.publish(&task_type, json!({"seq": 2})).await.unwrap();

    let d1 = broker.claim(&[&task_type]).await.unwrap().unwrap();
    broker.acknowledge(&d1).await.unwrap();
    let d2 = broker.claim(&[&task_type]).await.unwrap().unwrap();
    broker.acknowledge(&d2).await.unwrap();

    assert_eq!(d1.envelope.task_id, first);
    assert_eq!(d2.envelope.task_id, second);
}

#[tokio::test]
#[ignore] // Requires running Redis instance
async fn test_unacknowledged_claim_is_redelivered() {
    let client = test_client().await;
    let task_type = unique_task_type("redeliver");

    // Worker A claims but never acknowledges
    let worker_a = TaskBroker::new(client.clone(), short_wait_config(100));
    let task_id = worker_a.publish(&task_type, json!({})).await.unwrap();
    let claimed = worker_a.claim(&[&task_type]).await.unwrap();
    assert!(claimed.is_some());

    // Past the visibility timeout, worker B reclaims the same envelope
    tokio::time::sleep(Duration::from_millis(300)).await;

    let worker_b = TaskBroker::new(client, TaskBrokerConfig {
        consumer_group: worker_a.config().consumer_group.clone(),
        ..short_wait_config(100)
    });

    let redelivered = worker_b
        .claim(&[&task_type])
        .await
        .unwrap()
        .expect("expected redelivery after visibility timeout");

    assert_eq!(redelivered.envelope.task_id, task_id);
    worker_b.acknowledge(&redelivered).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires running Redis instance
async fn test_outcome_store_is_write_once() {
    let client = test_client().await;
    let backend = ResultBackend::new(client, Duration::from_secs(60));
    let task_id = Uuid::new_v4();

    backend
        .store(task_id, &TaskOutcome::success(json!({"count": 0})))
        .await
        .expect("first store failed");

    let err = backend
        .store(task_id, &TaskOutcome::failure("late writer"))
        .await
        .expect_err("second store must fail");
    assert!(matches!(err, ResultError::Duplicate(id) if id == task_id));

    // First record is intact
    let fetched = backend.fetch(task_id).await.unwrap().unwrap();
    assert_eq!(fetched, TaskOutcome::success(json!({"count": 0})));
}

#[tokio::test]
#[ignore] // Requires running Redis instance
async fn test_fetch_unknown_task_is_none() {
    let client = test_client().await;
    let backend = ResultBackend::new(client, Duration::from_secs(60));

    let fetched = backend.fetch(Uuid::new_v4()).await.unwrap();
    assert!(fetched.is_none());
}

#[tokio::test]
#[ignore] // Requires running Redis instance
async fn test_wait_for_times_out_without_outcome() {
    let client = test_client().await;
    let backend = ResultBackend::new(client, Duration::from_secs(60));
    let task_id = Uuid::new_v4();

    let err = backend
        .wait_for(task_id, Duration::from_millis(300))
        .await
        .expect_err("expected a timeout");
    assert!(matches!(err, ResultError::Timeout(id) if id == task_id));
}
