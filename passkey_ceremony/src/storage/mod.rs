mod cache_store;
mod config;
mod data_store;
mod errors;
mod schema_validation;
mod types;

pub use cache_store::{
    CacheStore, CacheStoreConfig, CacheStoreKind, ConcurrentCacheStore, InMemoryCacheStore,
    RedisCacheStore, SharedCacheStore, SqlCacheStore, into_shared,
};
pub use data_store::{
    DataStore, DataStoreConfig, DataStoreKind, PostgresDataStore, SqliteDataStore,
};
pub use errors::StorageError;
pub use types::CacheData;

pub(crate) use config::{DB_TABLE_CREDENTIALS, DB_TABLE_SESSIONS, DB_TABLE_USERS};
pub(crate) use schema_validation::{validate_postgres_table_schema, validate_sqlite_table_schema};

#[cfg(test)]
pub(crate) use data_store::{TempSqliteFile, connect_sqlite_memory};
