use std::sync::Arc;

use async_trait::async_trait;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

/// Backend handle shared by every typed session store. Each backend makes its
/// own operations atomic, so callers never lock around it.
pub type SharedCacheStore = Arc<dyn CacheStore>;

pub fn into_shared<S: CacheStore>(store: S) -> SharedCacheStore {
    Arc::new(store)
}

// Trait
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Initialize the store. This is called when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Put an entry, overwriting any existing one. The entry lives until
    /// `value.expires_at`.
    async fn put(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
    ) -> Result<(), StorageError>;

    /// Put an entry only if no live entry exists under the key (atomic check-and-set).
    /// Returns true if the entry was stored, false if a live one already existed.
    async fn put_if_not_exists(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
    ) -> Result<bool, StorageError>;

    /// Get a live entry. Expired entries are reported as absent.
    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;

    /// Atomically get and delete an entry. Of several concurrent callers at
    /// most one receives the value.
    async fn take(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;

    /// Remove an entry. Removing a missing key is not an error.
    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StorageError>;

    /// Drop every expired entry, returning how many were removed.
    async fn purge_expired(&self) -> Result<usize, StorageError>;

    /// Release connections held by the backend. Called once at shutdown.
    async fn close(&self) {}
}

pub(super) const CACHE_PREFIX: &str = "cache";

pub(super) fn make_key(prefix: &str, key: &str) -> String {
    format!("{CACHE_PREFIX}:{prefix}:{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_key() {
        // Given a prefix and key
        let prefix = "session";
        let key = "user123";

        // When creating a key
        let result = make_key(prefix, key);

        // Then it should be formatted correctly
        assert_eq!(result, "cache:session:user123");
    }
}
