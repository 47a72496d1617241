use std::{env, str::FromStr, sync::Arc};

use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use super::types::{DataStore, PostgresDataStore, SqliteDataStore};
use crate::storage::config::required_env;
use crate::storage::errors::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStoreKind {
    Memory,
    Sqlite,
    Postgres,
}

impl FromStr for DataStoreKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "postgres" => Ok(Self::Postgres),
            t => Err(StorageError::Config(format!(
                "Unsupported data store type: {t}. Supported types are 'memory', 'sqlite' and 'postgres'"
            ))),
        }
    }
}

/// Where users and credentials are persisted.
#[derive(Debug, Clone)]
pub struct DataStoreConfig {
    pub kind: DataStoreKind,
    pub url: Option<String>,
}

impl DataStoreConfig {
    /// Reads `GENERIC_DATA_STORE_TYPE` (default `memory`) and, for the
    /// relational kinds, `GENERIC_DATA_STORE_URL`.
    pub fn from_env() -> Result<Self, StorageError> {
        let kind = env::var("GENERIC_DATA_STORE_TYPE")
            .unwrap_or_else(|_| "memory".to_string())
            .parse::<DataStoreKind>()?;

        let url = match kind {
            DataStoreKind::Memory => None,
            _ => Some(required_env("GENERIC_DATA_STORE_URL")?),
        };

        Ok(Self { kind, url })
    }

    /// Opens a pool for the relational kinds. `Memory` has nothing to connect.
    pub async fn connect(&self) -> Result<Option<Arc<dyn DataStore>>, StorageError> {
        let url = match (self.kind, self.url.as_deref()) {
            (DataStoreKind::Memory, _) => return Ok(None),
            (_, Some(url)) => url,
            (_, None) => {
                return Err(StorageError::Config(
                    "GENERIC_DATA_STORE_URL must be set".to_string(),
                ));
            }
        };

        tracing::info!("Connecting data store: type={:?}", self.kind);

        let store: Arc<dyn DataStore> = match self.kind {
            DataStoreKind::Sqlite => Arc::new(connect_sqlite(url).await?),
            DataStoreKind::Postgres => Arc::new(connect_postgres(url).await?),
            DataStoreKind::Memory => return Ok(None),
        };

        Ok(Some(store))
    }
}

/// In-memory SQLite databases live only as long as their connection, so those
/// are pinned to a single connection that is never recycled.
pub(crate) async fn connect_sqlite(url: &str) -> Result<SqliteDataStore, StorageError> {
    let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

    let pool_options = if url.contains(":memory:") || url.contains("mode=memory") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
    };

    let pool = pool_options.connect_with(opts).await?;
    Ok(SqliteDataStore::new(pool))
}

pub(crate) async fn connect_postgres(url: &str) -> Result<PostgresDataStore, StorageError> {
    let pool = PgPoolOptions::new().connect(url).await?;
    Ok(PostgresDataStore::new(pool))
}

#[cfg(test)]
pub(crate) async fn connect_sqlite_memory() -> Arc<dyn DataStore> {
    Arc::new(
        connect_sqlite("sqlite::memory:")
            .await
            .expect("Failed to open in-memory sqlite"),
    )
}

/// File-backed SQLite database with a real multi-connection pool, removed on drop.
#[cfg(test)]
pub(crate) struct TempSqliteFile {
    pub(crate) store: Arc<dyn DataStore>,
    path: std::path::PathBuf,
}

#[cfg(test)]
impl TempSqliteFile {
    pub(crate) async fn open() -> Self {
        let path = env::temp_dir().join(format!("passkey_ceremony_{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}", path.display());
        let store = connect_sqlite(&url)
            .await
            .expect("Failed to open file-backed sqlite");
        Self {
            store: Arc::new(store),
            path,
        }
    }
}

#[cfg(test)]
impl Drop for TempSqliteFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
