//! Read-only queries for `repository_collections` and their settings.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row type
// ---------------------------------------------------------------------------

/// A `repository_collections` row joined with its (optional) settings row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectionRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    pub slug: String,
    pub enabled: bool,
    /// `NULL` when the collection has no `repository_collection_settings` row.
    pub setting_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollectionRow {
    #[must_use]
    pub fn into_collection(self) -> repocrawl_core::Collection {
        repocrawl_core::Collection {
            id: self.id,
            public_id: self.public_id,
            name: self.name,
            setting_id: self.setting_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

const SELECT_COLLECTIONS: &str = "SELECT c.id, c.public_id, c.name, c.slug, c.enabled, \
            s.id AS setting_id, c.created_at, c.updated_at \
     FROM repository_collections c \
     LEFT JOIN repository_collection_settings s ON s.repository_collection_id = c.id";

/// Returns all enabled collections, ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_enabled_collections(pool: &PgPool) -> Result<Vec<CollectionRow>, DbError> {
    let sql = format!("{SELECT_COLLECTIONS} WHERE c.enabled = true ORDER BY c.id");
    let rows = sqlx::query_as::<_, CollectionRow>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns a single collection by slug, enabled or not.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no collection has this slug, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_collection_by_slug(pool: &PgPool, slug: &str) -> Result<CollectionRow, DbError> {
    let sql = format!("{SELECT_COLLECTIONS} WHERE c.slug = $1");
    sqlx::query_as::<_, CollectionRow>(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}
