/// Configuration management
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct shared by the worker binary and any
/// task producer.
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `REDIS_URL`: Redis connection URL (required)
/// - `SUPERUSER_EMAIL`: Email of the account to promote at boot (optional)
/// - `WORKER_CONSUMER_GROUP`: Consumer group name (default: depot-workers)
/// - `WORKER_VISIBILITY_TIMEOUT_SECS`: Seconds before an unacknowledged
///   envelope becomes re-claimable (default: 30)
/// - `WORKER_CLAIM_BLOCK_MS`: Blocking wait per claim attempt (default: 5000)
/// - `WORKER_MAX_CONCURRENT_TASKS`: Concurrent task cap (default: 10)
/// - `RESULT_TTL_SECS`: Retention window for stored task outcomes
///   (default: 3600)
///
/// # Example
///
/// ```no_run
/// use depot_shared::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Consumer group: {}", config.worker.consumer_group);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseSettings,

    /// Redis configuration
    pub redis: RedisSettings,

    /// Worker runtime configuration
    pub worker: WorkerSettings,

    /// Email of the account promoted to superuser at boot, if set
    pub superuser_email: Option<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL
    ///
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,

    /// Command timeout in seconds
    pub command_timeout_secs: u64,
}

/// Worker runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Consumer group shared by all worker instances
    pub consumer_group: String,

    /// Seconds an unacknowledged envelope stays invisible before another
    /// worker may reclaim it
    pub visibility_timeout_secs: u64,

    /// Milliseconds a single claim attempt blocks waiting for work
    pub claim_block_ms: u64,

    /// Maximum number of tasks executing concurrently in one worker
    pub max_concurrent_tasks: usize,

    /// Seconds a stored task outcome is retained before expiring
    pub result_ttl_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            consumer_group: "depot-workers".to_string(),
            visibility_timeout_secs: 30,
            claim_block_ms: 5000,
            max_concurrent_tasks: 10,
            result_ttl_secs: 3600,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// have invalid values.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let redis_url = env::var("REDIS_URL")
            .map_err(|_| anyhow::anyhow!("REDIS_URL environment variable is required"))?;

        let command_timeout_secs = env::var("REDIS_COMMAND_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()?;

        let defaults = WorkerSettings::default();

        let consumer_group =
            env::var("WORKER_CONSUMER_GROUP").unwrap_or(defaults.consumer_group);

        let visibility_timeout_secs = env::var("WORKER_VISIBILITY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.visibility_timeout_secs);

        let claim_block_ms = env::var("WORKER_CLAIM_BLOCK_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.claim_block_ms);

        let max_concurrent_tasks = env::var("WORKER_MAX_CONCURRENT_TASKS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_concurrent_tasks);

        let result_ttl_secs = env::var("RESULT_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.result_ttl_secs);

        // Absence is a valid no-op state for the startup reconciler, and an
        // empty string counts as absent.
        let superuser_email = env::var("SUPERUSER_EMAIL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Ok(Self {
            database: DatabaseSettings {
                url: database_url,
                max_connections,
            },
            redis: RedisSettings {
                url: redis_url,
                command_timeout_secs,
            },
            worker: WorkerSettings {
                consumer_group,
                visibility_timeout_secs,
                claim_block_ms,
                max_concurrent_tasks,
                result_ttl_secs,
            },
            superuser_email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_settings_defaults() {
        let settings = WorkerSettings::default();
        assert_eq!(settings.consumer_group, "depot-workers");
        assert_eq!(settings.visibility_timeout_secs, 30);
        assert_eq!(settings.claim_block_ms, 5000);
        assert_eq!(settings.max_concurrent_tasks, 10);
        assert_eq!(settings.result_ttl_secs, 3600);
    }
}
