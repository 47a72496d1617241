mod concurrent;
mod config;
mod memory;
mod redis;
mod sql;
mod types;

pub use concurrent::ConcurrentCacheStore;
pub use config::{CacheStoreConfig, CacheStoreKind};
pub use memory::InMemoryCacheStore;
pub use redis::RedisCacheStore;
pub use sql::SqlCacheStore;
pub use types::{CacheStore, SharedCacheStore, into_shared};
