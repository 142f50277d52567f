/// Database migration runner
///
/// Migrations are stored in the `migrations/` directory at the crate root
/// and applied with sqlx's embedded migrator.
///
/// # Example
///
/// ```no_run
/// use depot_shared::config::DatabaseSettings;
/// use depot_shared::db::{migrations::run_migrations, pool::create_pool};
///
/// # async fn example(settings: &DatabaseSettings) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(settings).await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::postgres::PgPool;
use tracing::{info, warn};

/// Runs all pending database migrations
///
/// # Errors
///
/// Returns an error if a migration file is malformed or fails to execute.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    match sqlx::migrate!("./migrations").run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}
