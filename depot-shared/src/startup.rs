/// Startup reconciliation: converge the configured account to superuser
///
/// Run exactly once per process boot, before the worker loop starts. Reads
/// one configuration value (`SUPERUSER_EMAIL`), looks up the user it names,
/// and promotes that user if and only if they exist and are not already a
/// superuser. The routine never creates a user and never demotes one.
///
/// # State machine
///
/// ```text
/// SUPERUSER_EMAIL unset ──────────────────────> NoTarget (no side effects)
/// set, no such user ──────────────────────────> TargetMissing (log only)
/// user found, is_superuser ───────────────────> AlreadyElevated (no write)
/// user found, !is_superuser ──> promote+commit> Promoted
/// any storage failure ────────────────────────> Failed (logged, swallowed)
/// ```
///
/// Errors are logged with full detail and swallowed: administrative
/// bootstrapping is best-effort and must never gate service availability,
/// so this routine cannot abort process startup. Running it twice in a row
/// is safe; the second run lands on `AlreadyElevated` and writes nothing.

use crate::models::user::User;
use sqlx::PgPool;
use tracing::{debug, error, info};

/// Terminal state reached by one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// No target email configured; nothing to do
    NoTarget,

    /// Target email configured but no user has it
    TargetMissing,

    /// Target user is already a superuser; nothing written
    AlreadyElevated,

    /// Target user was promoted and verified
    Promoted,

    /// A storage failure occurred; logged and swallowed
    Failed,
}

/// Promotes the configured account to superuser, if needed
///
/// Takes the already-resolved configuration value rather than reading the
/// environment itself, so the caller controls exactly one lookup per boot.
///
/// Never returns an error: every failure path is logged and collapsed into
/// `Reconciliation::Failed`.
pub async fn promote_superuser_from_env(
    pool: &PgPool,
    superuser_email: Option<&str>,
) -> Reconciliation {
    let email = match superuser_email {
        Some(email) => email,
        None => {
            debug!("SUPERUSER_EMAIL is not set, skipping superuser promotion");
            return Reconciliation::NoTarget;
        }
    };

    match try_promote(pool, email).await {
        Ok(state) => state,
        Err(e) => {
            // Deliberate: a failed promotion must not abort process startup
            error!(
                email = %email,
                error = %e,
                "Error promoting user to superuser; continuing startup"
            );
            Reconciliation::Failed
        }
    }
}

/// Fallible body of the reconciliation, separated so the caller can swallow
async fn try_promote(pool: &PgPool, email: &str) -> Result<Reconciliation, sqlx::Error> {
    let user = match User::find_by_email(pool, email).await? {
        Some(user) => user,
        None => {
            info!(
                email = %email,
                "No user with the configured email exists, skipping superuser promotion"
            );
            return Ok(Reconciliation::TargetMissing);
        }
    };

    if user.is_superuser {
        info!(
            email = %email,
            user_id = %user.id,
            "User is already a superuser, no action needed"
        );
        return Ok(Reconciliation::AlreadyElevated);
    }

    info!(email = %email, user_id = %user.id, "Promoting user to superuser");

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        UPDATE users
        SET is_superuser = TRUE, is_verified = TRUE, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    // Refresh so the logged state reflects the committed row
    let refreshed = User::find_by_id(pool, user.id).await?;
    if let Some(refreshed) = refreshed {
        info!(
            email = %refreshed.email,
            user_id = %refreshed.id,
            is_superuser = refreshed.is_superuser,
            is_verified = refreshed.is_verified,
            "Successfully promoted user to superuser"
        );
    }

    Ok(Reconciliation::Promoted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconciliation_states_compare() {
        assert_eq!(Reconciliation::NoTarget, Reconciliation::NoTarget);
        assert_ne!(Reconciliation::Promoted, Reconciliation::AlreadyElevated);
    }

    // All reconciliation paths are exercised against a live Postgres in
    // tests/reconciler_tests.rs
}
