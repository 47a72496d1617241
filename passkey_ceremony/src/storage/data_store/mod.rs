mod config;
mod types;

pub use config::{DataStoreConfig, DataStoreKind};
pub use types::{DataStore, PostgresDataStore, SqliteDataStore};

pub(crate) use config::{connect_postgres, connect_sqlite};

#[cfg(test)]
pub(crate) use config::{TempSqliteFile, connect_sqlite_memory};
