/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(320) NOT NULL UNIQUE,
///     hashed_password VARCHAR(1024) NOT NULL,
///     name VARCHAR(255),
///     avatar VARCHAR(255),
///     phone VARCHAR(64),
///     is_active BOOLEAN NOT NULL DEFAULT TRUE,
///     is_superuser BOOLEAN NOT NULL DEFAULT FALSE,
///     is_verified BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// Password hashing and verification are the identity collaborator's
/// concern; this crate only stores the opaque hash it is given.
///
/// # Example
///
/// ```no_run
/// use depot_shared::models::user::{CreateUser, User};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(
///     &pool,
///     CreateUser {
///         email: "user@example.com".to_string(),
///         hashed_password: "$argon2id$...".to_string(),
///         name: Some("John Doe".to_string()),
///         avatar: None,
///         phone: None,
///     },
/// )
/// .await?;
///
/// let found = User::find_by_email(&pool, "user@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, hashed_password, name, avatar, phone, \
     is_active, is_superuser, is_verified, created_at, updated_at, last_login_at";

/// User account
///
/// Owns zero or more items. Deleting a user deletes all of its items in the
/// same transaction; an item never outlives its owner.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Email address, unique across all users
    pub email: String,

    /// Opaque password hash supplied by the identity layer
    pub hashed_password: String,

    /// Optional display name
    pub name: Option<String>,

    /// Optional avatar URL
    pub avatar: Option<String>,

    /// Optional phone number
    pub phone: Option<String>,

    /// Whether the account is active
    pub is_active: bool,

    /// Whether the account has elevated privileges
    pub is_superuser: bool,

    /// Whether the email address has been verified
    pub is_verified: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated (refreshed on every write)
    pub updated_at: DateTime<Utc>,

    /// When the user last logged in (None if never)
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address
    pub email: String,

    /// Opaque password hash (never a plaintext password)
    pub hashed_password: String,

    /// Optional display name
    pub name: Option<String>,

    /// Optional avatar URL
    pub avatar: Option<String>,

    /// Optional phone number
    pub phone: Option<String>,
}

/// Input for updating an existing user
///
/// All fields are optional; only non-None fields are written. `updated_at`
/// is refreshed on every update regardless.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    /// New email address
    pub email: Option<String>,

    /// New password hash
    pub hashed_password: Option<String>,

    /// New display name (use Some(None) to clear)
    pub name: Option<Option<String>>,

    /// New avatar URL (use Some(None) to clear)
    pub avatar: Option<Option<String>>,

    /// New phone number (use Some(None) to clear)
    pub phone: Option<Option<String>>,

    /// Update active status
    pub is_active: Option<bool>,

    /// Update verification status
    pub is_verified: Option<bool>,
}

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns an error if the email already exists or the database is
    /// unreachable.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, hashed_password, name, avatar, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#,
        ))
        .bind(data.email)
        .bind(data.hashed_password)
        .bind(data.name)
        .bind(data.avatar)
        .bind(data.phone)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1",
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Updates an existing user
    ///
    /// Only non-None fields in `data` are written. `updated_at` is set to
    /// the current time on every update.
    ///
    /// # Returns
    ///
    /// The updated user if found, None if the user doesn't exist.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build the update statement from whichever fields are present
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.email.is_some() {
            bind_count += 1;
            query.push_str(&format!(", email = ${}", bind_count));
        }
        if data.hashed_password.is_some() {
            bind_count += 1;
            query.push_str(&format!(", hashed_password = ${}", bind_count));
        }
        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.avatar.is_some() {
            bind_count += 1;
            query.push_str(&format!(", avatar = ${}", bind_count));
        }
        if data.phone.is_some() {
            bind_count += 1;
            query.push_str(&format!(", phone = ${}", bind_count));
        }
        if data.is_active.is_some() {
            bind_count += 1;
            query.push_str(&format!(", is_active = ${}", bind_count));
        }
        if data.is_verified.is_some() {
            bind_count += 1;
            query.push_str(&format!(", is_verified = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {USER_COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(email) = data.email {
            q = q.bind(email);
        }
        if let Some(hashed_password) = data.hashed_password {
            q = q.bind(hashed_password);
        }
        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(avatar) = data.avatar {
            q = q.bind(avatar);
        }
        if let Some(phone) = data.phone {
            q = q.bind(phone);
        }
        if let Some(is_active) = data.is_active {
            q = q.bind(is_active);
        }
        if let Some(is_verified) = data.is_verified {
            q = q.bind(is_verified);
        }

        let user = q.fetch_optional(pool).await?;

        Ok(user)
    }

    /// Deletes a user and all items they own
    ///
    /// The items are deleted first, then the user, in a single transaction;
    /// either both deletes commit or neither does.
    ///
    /// # Returns
    ///
    /// True if the user was deleted, false if the user didn't exist.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM items WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Updates the last login timestamp for a user
    ///
    /// Typically called after successful authentication.
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists users with pagination, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// Counts total number of users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_user_struct() {
        let create_user = CreateUser {
            email: "test@example.com".to_string(),
            hashed_password: "hash".to_string(),
            name: Some("Test User".to_string()),
            avatar: None,
            phone: None,
        };

        assert_eq!(create_user.email, "test@example.com");
        assert_eq!(create_user.hashed_password, "hash");
    }

    #[test]
    fn test_update_user_default_is_empty() {
        let update = UpdateUser::default();
        assert!(update.email.is_none());
        assert!(update.hashed_password.is_none());
        assert!(update.name.is_none());
        assert!(update.avatar.is_none());
        assert!(update.phone.is_none());
        assert!(update.is_active.is_none());
        assert!(update.is_verified.is_none());
    }

    // Integration tests for database operations are in tests/cascade_tests.rs
}
