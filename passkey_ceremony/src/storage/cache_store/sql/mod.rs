mod postgres;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::data_store::DataStore;
use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::CacheStore;

/// Relational backend over the `{prefix}sessions` table. Expiry is an explicit
/// millisecond column; consumption is a single `DELETE ... RETURNING`.
pub struct SqlCacheStore {
    store: Arc<dyn DataStore>,
}

impl SqlCacheStore {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        tracing::info!("Creating new relational generic cache store");
        Self { store }
    }
}

/// Row shape shared by both dialects.
#[derive(sqlx::FromRow)]
struct SessionRow {
    user_id: Option<String>,
    value: String,
    expires_at: i64,
}

impl TryFrom<SessionRow> for CacheData {
    type Error = StorageError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let expires_at = DateTime::<Utc>::from_timestamp_millis(row.expires_at).ok_or_else(|| {
            StorageError::Storage(format!("Invalid expires_at value: {}", row.expires_at))
        })?;
        Ok(CacheData::new(row.value, row.user_id, expires_at))
    }
}

fn live_row(row: Option<SessionRow>) -> Result<Option<CacheData>, StorageError> {
    match row {
        Some(row) => {
            let data = CacheData::try_from(row)?;
            Ok((!data.is_expired()).then_some(data))
        }
        None => Ok(None),
    }
}

fn unsupported() -> StorageError {
    StorageError::Storage("Unsupported database type".to_string())
}

#[async_trait]
impl CacheStore for SqlCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        if let Some(pool) = self.store.as_sqlite() {
            sqlite::create_tables(pool).await?;
            sqlite::validate_tables(pool).await
        } else if let Some(pool) = self.store.as_postgres() {
            postgres::create_tables(pool).await?;
            postgres::validate_tables(pool).await
        } else {
            Err(unsupported())
        }
    }

    async fn put(&self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError> {
        if let Some(pool) = self.store.as_sqlite() {
            sqlite::upsert(pool, prefix, key, &value, false).await.map(|_| ())
        } else if let Some(pool) = self.store.as_postgres() {
            postgres::upsert(pool, prefix, key, &value, false)
                .await
                .map(|_| ())
        } else {
            Err(unsupported())
        }
    }

    async fn put_if_not_exists(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
    ) -> Result<bool, StorageError> {
        if let Some(pool) = self.store.as_sqlite() {
            sqlite::upsert(pool, prefix, key, &value, true).await
        } else if let Some(pool) = self.store.as_postgres() {
            postgres::upsert(pool, prefix, key, &value, true).await
        } else {
            Err(unsupported())
        }
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let row = if let Some(pool) = self.store.as_sqlite() {
            sqlite::get(pool, prefix, key).await?
        } else if let Some(pool) = self.store.as_postgres() {
            postgres::get(pool, prefix, key).await?
        } else {
            return Err(unsupported());
        };
        live_row(row)
    }

    async fn take(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let row = if let Some(pool) = self.store.as_sqlite() {
            sqlite::take(pool, prefix, key).await?
        } else if let Some(pool) = self.store.as_postgres() {
            postgres::take(pool, prefix, key).await?
        } else {
            return Err(unsupported());
        };
        live_row(row)
    }

    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StorageError> {
        if let Some(pool) = self.store.as_sqlite() {
            sqlite::remove(pool, prefix, key).await
        } else if let Some(pool) = self.store.as_postgres() {
            postgres::remove(pool, prefix, key).await
        } else {
            Err(unsupported())
        }
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        let now = Utc::now().timestamp_millis();
        if let Some(pool) = self.store.as_sqlite() {
            sqlite::purge_expired(pool, now).await
        } else if let Some(pool) = self.store.as_postgres() {
            postgres::purge_expired(pool, now).await
        } else {
            Err(unsupported())
        }
    }

    async fn close(&self) {
        self.store.close().await;
    }
}
