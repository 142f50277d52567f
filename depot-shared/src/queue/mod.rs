/// Redis integration for the task core
///
/// This module provides the two external services the workers share:
/// - `broker`: durable task streams with consumer-group claim/acknowledge
/// - `results`: write-once outcome store with per-key expiry
///
/// plus the `client` connection wrapper both are built on.
///
/// # Architecture
///
/// ```text
/// ┌──────────┐  publish   ┌────────────────────────┐
/// │ Producer │ ──XADD──>  │ tasks:{task_type}      │
/// └──────────┘            └────────────────────────┘
///      │ wait_for                  │ XREADGROUP / XCLAIM
///      ▼                          ▼
/// task-result:{task_id} <──SET NX EX── Worker ──XACK──> broker
/// ```

pub mod broker;
pub mod client;
pub mod results;

// Re-export common types for convenience
pub use broker::{BrokerError, Delivery, TaskBroker, TaskBrokerConfig};
pub use client::{RedisClient, RedisClientError};
pub use results::{ResultBackend, ResultError};
