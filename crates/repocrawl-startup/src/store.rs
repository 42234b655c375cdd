use async_trait::async_trait;
use repocrawl_core::Collection;
use sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] repocrawl_db::DbError),

    #[error("collection store unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the repository collections.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// All enabled collections, in the store's natural order.
    async fn list_enabled_collections(&self) -> Result<Vec<Collection>, StoreError>;
}

#[async_trait]
impl CollectionStore for PgPool {
    async fn list_enabled_collections(&self) -> Result<Vec<Collection>, StoreError> {
        let rows = repocrawl_db::list_enabled_collections(self).await?;
        Ok(rows
            .into_iter()
            .map(repocrawl_db::CollectionRow::into_collection)
            .collect())
    }
}
