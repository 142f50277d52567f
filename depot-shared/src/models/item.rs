/// Inventory item model and database operations
///
/// Items belong to exactly one user. Quantity is optional; when present it
/// is non-negative (enforced by a CHECK constraint).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE items (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     description TEXT,
///     quantity INTEGER CHECK (quantity >= 0),
///     user_id UUID NOT NULL REFERENCES users(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const ITEM_COLUMNS: &str =
    "id, name, description, quantity, user_id, created_at, updated_at";

/// Inventory item owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    /// Unique item ID (UUID v4)
    pub id: Uuid,

    /// Item name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Optional non-negative quantity
    pub quantity: Option<i32>,

    /// Owning user
    pub user_id: Uuid,

    /// When the item was created
    pub created_at: DateTime<Utc>,

    /// When the item was last updated (refreshed on every write)
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItem {
    /// Item name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Optional non-negative quantity
    pub quantity: Option<i32>,

    /// Owning user
    pub user_id: Uuid,
}

/// Input for updating an existing item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateItem {
    /// New name
    pub name: Option<String>,

    /// New description (use Some(None) to clear)
    pub description: Option<Option<String>>,

    /// New quantity (use Some(None) to clear)
    pub quantity: Option<Option<i32>>,
}

impl Item {
    /// Creates a new item
    ///
    /// # Errors
    ///
    /// Returns an error if the owning user doesn't exist, the quantity is
    /// negative, or the database is unreachable.
    pub async fn create(pool: &PgPool, data: CreateItem) -> Result<Self, sqlx::Error> {
        let item = sqlx::query_as::<_, Item>(&format!(
            r#"
            INSERT INTO items (name, description, quantity, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {ITEM_COLUMNS}
            "#,
        ))
        .bind(data.name)
        .bind(data.description)
        .bind(data.quantity)
        .bind(data.user_id)
        .fetch_one(pool)
        .await?;

        Ok(item)
    }

    /// Finds an item by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let item = sqlx::query_as::<_, Item>(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(item)
    }

    /// Lists items owned by a user, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let items = sqlx::query_as::<_, Item>(&format!(
            r#"
            SELECT {ITEM_COLUMNS}
            FROM items
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(items)
    }

    /// Updates an existing item
    ///
    /// Only non-None fields in `data` are written. `updated_at` is refreshed
    /// on every update.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateItem,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE items SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.quantity.is_some() {
            bind_count += 1;
            query.push_str(&format!(", quantity = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {ITEM_COLUMNS}"));

        let mut q = sqlx::query_as::<_, Item>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(quantity) = data.quantity {
            q = q.bind(quantity);
        }

        let item = q.fetch_optional(pool).await?;

        Ok(item)
    }

    /// Deletes an item by ID
    ///
    /// # Returns
    ///
    /// True if the item was deleted, false if it didn't exist.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts items owned by a user
    pub async fn count_for_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM items WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_item_struct() {
        let create = CreateItem {
            name: "widget".to_string(),
            description: None,
            quantity: Some(3),
            user_id: Uuid::new_v4(),
        };

        assert_eq!(create.name, "widget");
        assert_eq!(create.quantity, Some(3));
    }

    #[test]
    fn test_update_item_default_is_empty() {
        let update = UpdateItem::default();
        assert!(update.name.is_none());
        assert!(update.description.is_none());
        assert!(update.quantity.is_none());
    }
}
