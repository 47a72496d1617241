use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CacheStore, make_key};

/// Sharded concurrent map. Clones share the same entries, and every
/// operation is atomic on its own, so handles can be used from many tasks
/// without an outer lock.
#[derive(Debug, Clone, Default)]
pub struct ConcurrentCacheStore {
    entry: Arc<DashMap<String, CacheData>>,
}

impl ConcurrentCacheStore {
    pub fn new() -> Self {
        tracing::info!("Creating new concurrent generic cache store");
        Self {
            entry: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_empty()
    }
}

#[async_trait]
impl CacheStore for ConcurrentCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put(&self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError> {
        self.entry.insert(make_key(prefix, key), value);
        Ok(())
    }

    async fn put_if_not_exists(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
    ) -> Result<bool, StorageError> {
        // The entry guard holds the shard lock for the whole check-and-set.
        match self.entry.entry(make_key(prefix, key)) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired() {
                    occupied.insert(value);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(value);
                Ok(true)
            }
        }
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        Ok(self
            .entry
            .get(&make_key(prefix, key))
            .filter(|data| !data.is_expired())
            .map(|data| data.value().clone()))
    }

    async fn take(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        Ok(self
            .entry
            .remove(&make_key(prefix, key))
            .map(|(_, data)| data)
            .filter(|data| !data.is_expired()))
    }

    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StorageError> {
        self.entry.remove(&make_key(prefix, key));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        let now = Utc::now();
        let mut removed = 0;
        self.entry.retain(|_, data| {
            let keep = !data.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
