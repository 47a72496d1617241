use std::{env, str::FromStr, sync::Arc};

use super::types::{CacheStore, SharedCacheStore};
use super::{ConcurrentCacheStore, InMemoryCacheStore, RedisCacheStore, SqlCacheStore};
use crate::storage::config::required_env;
use crate::storage::data_store::{connect_postgres, connect_sqlite};
use crate::storage::errors::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStoreKind {
    Memory,
    Concurrent,
    Redis,
    Sqlite,
    Postgres,
}

impl FromStr for CacheStoreKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "concurrent" => Ok(Self::Concurrent),
            "redis" => Ok(Self::Redis),
            "sqlite" => Ok(Self::Sqlite),
            "postgres" => Ok(Self::Postgres),
            t => Err(StorageError::Config(format!(
                "Unsupported cache store type: {t}. Supported types are 'memory', 'concurrent', 'redis', 'sqlite' and 'postgres'"
            ))),
        }
    }
}

/// Where ceremony state, sessions and verification codes live.
#[derive(Debug, Clone)]
pub struct CacheStoreConfig {
    pub kind: CacheStoreKind,
    pub url: Option<String>,
}

impl CacheStoreConfig {
    /// Reads `GENERIC_CACHE_STORE_TYPE` (default `memory`) and, for the
    /// networked kinds, `GENERIC_CACHE_STORE_URL`.
    pub fn from_env() -> Result<Self, StorageError> {
        let kind = env::var("GENERIC_CACHE_STORE_TYPE")
            .unwrap_or_else(|_| "memory".to_string())
            .parse::<CacheStoreKind>()?;

        let url = match kind {
            CacheStoreKind::Memory | CacheStoreKind::Concurrent => None,
            _ => Some(required_env("GENERIC_CACHE_STORE_URL")?),
        };

        Ok(Self { kind, url })
    }

    fn url(&self) -> Result<&str, StorageError> {
        self.url
            .as_deref()
            .ok_or_else(|| StorageError::Config("GENERIC_CACHE_STORE_URL must be set".to_string()))
    }

    /// Constructs and initializes the configured backend.
    pub async fn build(&self) -> Result<Box<dyn CacheStore>, StorageError> {
        tracing::info!("Initializing cache store with type: {:?}", self.kind);

        let store: Box<dyn CacheStore> = match self.kind {
            CacheStoreKind::Memory => Box::new(InMemoryCacheStore::new()),
            CacheStoreKind::Concurrent => Box::new(ConcurrentCacheStore::new()),
            CacheStoreKind::Redis => Box::new(RedisCacheStore::new(self.url()?)?),
            CacheStoreKind::Sqlite => {
                let data_store = connect_sqlite(self.url()?).await?;
                Box::new(SqlCacheStore::new(Arc::new(data_store)))
            }
            CacheStoreKind::Postgres => {
                let data_store = connect_postgres(self.url()?).await?;
                Box::new(SqlCacheStore::new(Arc::new(data_store)))
            }
        };

        store.init().await?;
        Ok(store)
    }

    pub async fn build_shared(&self) -> Result<SharedCacheStore, StorageError> {
        Ok(Arc::from(self.build().await?))
    }
}
