//! # Depot Worker
//!
//! Background worker for the Depot task core. On startup it:
//! - loads configuration from the environment
//! - connects to Postgres and Redis and runs pending migrations
//! - runs the one-shot superuser reconciliation (best-effort, never fatal)
//! - starts the claim/execute/store/acknowledge loop
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p depot-worker
//! ```

use depot_shared::config::Config;
use depot_shared::db::{migrations::run_migrations, pool};
use depot_shared::queue::broker::{TaskBroker, TaskBrokerConfig};
use depot_shared::queue::client::RedisClient;
use depot_shared::queue::results::ResultBackend;
use depot_shared::startup::promote_superuser_from_env;
use depot_worker::handlers::{CountItemsHandler, HandlerRegistry};
use depot_worker::runtime::{RuntimeConfig, WorkerRuntime};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "depot_worker=debug,depot_shared=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Depot Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let db_pool = pool::create_pool(&config.database).await?;
    run_migrations(&db_pool).await?;

    let redis_client = RedisClient::new(config.redis.clone()).await?;

    // Best-effort administrative bootstrap; runs once, never aborts startup
    let reconciliation =
        promote_superuser_from_env(&db_pool, config.superuser_email.as_deref()).await;
    tracing::info!(state = ?reconciliation, "Startup reconciliation finished");

    let broker = Arc::new(TaskBroker::new(
        redis_client.clone(),
        TaskBrokerConfig::from_worker_settings(&config.worker),
    ));
    let results = ResultBackend::new(
        redis_client,
        Duration::from_secs(config.worker.result_ttl_secs),
    );

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(CountItemsHandler));

    let runtime = WorkerRuntime::new(
        db_pool.clone(),
        broker,
        results,
        Arc::new(registry),
        RuntimeConfig {
            max_concurrent_tasks: config.worker.max_concurrent_tasks,
            ..RuntimeConfig::default()
        },
    );

    let shutdown_token = runtime.shutdown_token();
    let runtime_handle = tokio::spawn(async move { runtime.run().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping worker");
    shutdown_token.cancel();

    runtime_handle.await??;

    pool::close_pool(db_pool).await;
    tracing::info!("Worker exited cleanly");

    Ok(())
}
