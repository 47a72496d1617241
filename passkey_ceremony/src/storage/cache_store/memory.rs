use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CacheStore, make_key};

/// Plain map behind a single lock. Each operation holds the lock for its whole
/// check-and-set, which is what makes `take` and `put_if_not_exists` atomic.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entry: Mutex<HashMap<String, CacheData>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory generic cache store");
        Self {
            entry: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(()) // Nothing to initialize for in-memory store
    }

    async fn put(&self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError> {
        self.entry.lock().await.insert(make_key(prefix, key), value);
        Ok(())
    }

    async fn put_if_not_exists(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
    ) -> Result<bool, StorageError> {
        let key = make_key(prefix, key);
        let mut entry = self.entry.lock().await;
        match entry.get(&key) {
            Some(existing) if !existing.is_expired() => Ok(false),
            _ => {
                entry.insert(key, value);
                Ok(true)
            }
        }
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        Ok(self
            .entry
            .lock()
            .await
            .get(&make_key(prefix, key))
            .filter(|data| !data.is_expired())
            .cloned())
    }

    async fn take(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        Ok(self
            .entry
            .lock()
            .await
            .remove(&make_key(prefix, key))
            .filter(|data| !data.is_expired()))
    }

    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StorageError> {
        self.entry.lock().await.remove(&make_key(prefix, key));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        let now = Utc::now();
        let mut entry = self.entry.lock().await;
        let before = entry.len();
        entry.retain(|_, data| !data.is_expired_at(now));
        Ok(before - entry.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn live(value: &str) -> CacheData {
        CacheData::new(value.to_string(), None, Utc::now() + Duration::minutes(5))
    }

    fn expired(value: &str) -> CacheData {
        CacheData::new(value.to_string(), None, Utc::now() - Duration::seconds(1))
    }

    #[tokio::test]
    async fn test_put_and_get() {
        // Given an in-memory cache store
        let store = InMemoryCacheStore::new();

        // When putting a value
        store.put("test", "key1", live("test value")).await.unwrap();

        // Then it can be read back
        let retrieved = store.get("test", "key1").await.unwrap();
        assert_eq!(retrieved.unwrap().value, "test value");
    }

    #[tokio::test]
    async fn test_prefixes_are_isolated() {
        let store = InMemoryCacheStore::new();
        store.put("a", "k", live("in a")).await.unwrap();

        assert!(store.get("b", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_absent_before_purge() {
        // Given an entry that has already expired but was never removed
        let store = InMemoryCacheStore::new();
        store.put("test", "old", expired("stale")).await.unwrap();

        // Then reads and takes report it as absent
        assert!(store.get("test", "old").await.unwrap().is_none());
        assert!(store.take("test", "old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_if_not_exists() {
        // Given a stored live entry
        let store = InMemoryCacheStore::new();
        assert!(store.put_if_not_exists("p", "k", live("first")).await.unwrap());

        // When inserting under the same key again
        let second = store.put_if_not_exists("p", "k", live("second")).await.unwrap();

        // Then the second insert is refused and the first value survives
        assert!(!second);
        assert_eq!(store.get("p", "k").await.unwrap().unwrap().value, "first");
    }

    #[tokio::test]
    async fn test_put_if_not_exists_replaces_expired() {
        let store = InMemoryCacheStore::new();
        store.put("p", "k", expired("stale")).await.unwrap();

        assert!(store.put_if_not_exists("p", "k", live("fresh")).await.unwrap());
        assert_eq!(store.get("p", "k").await.unwrap().unwrap().value, "fresh");
    }

    #[tokio::test]
    async fn test_take_is_single_use() {
        // Given a stored entry
        let store = InMemoryCacheStore::new();
        store.put("p", "k", live("once")).await.unwrap();

        // When taking it twice
        let first = store.take("p", "k").await.unwrap();
        let second = store.take("p", "k").await.unwrap();

        // Then only the first take sees it
        assert_eq!(first.unwrap().value, "once");
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = InMemoryCacheStore::new();
        store.put("p", "k", live("v")).await.unwrap();

        assert!(store.remove("p", "k").await.is_ok());
        assert!(store.remove("p", "k").await.is_ok());
        assert!(store.get("p", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        // Given one live and two expired entries
        let store = InMemoryCacheStore::new();
        store.put("p", "live", live("v")).await.unwrap();
        store.put("p", "old1", expired("v")).await.unwrap();
        store.put("q", "old2", expired("v")).await.unwrap();

        // When purging
        let removed = store.purge_expired().await.unwrap();

        // Then only the expired entries go
        assert_eq!(removed, 2);
        assert!(store.get("p", "live").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_take_has_single_winner() {
        // Given one entry shared by many tasks
        let store = std::sync::Arc::new(InMemoryCacheStore::new());
        store.put("p", "k", live("prize")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.take("p", "k").await }));
        }

        // When every task tries to take it
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().is_some() {
                winners += 1;
            }
        }

        // Then exactly one succeeds
        assert_eq!(winners, 1);
    }
}
