//! Database table configuration

use std::env;
use std::sync::LazyLock;

/// Table prefix from environment variable
pub(crate) static DB_TABLE_PREFIX: LazyLock<String> =
    LazyLock::new(|| env::var("DB_TABLE_PREFIX").unwrap_or_else(|_| "pkc_".to_string()));

/// Users table name
pub(crate) static DB_TABLE_USERS: LazyLock<String> =
    LazyLock::new(|| format!("{}users", *DB_TABLE_PREFIX));

/// Credentials table name
pub(crate) static DB_TABLE_CREDENTIALS: LazyLock<String> =
    LazyLock::new(|| format!("{}user_credentials", *DB_TABLE_PREFIX));

/// Sessions table name, used by the relational cache backend
pub(crate) static DB_TABLE_SESSIONS: LazyLock<String> =
    LazyLock::new(|| format!("{}sessions", *DB_TABLE_PREFIX));

/// Reads a required env var, mapping absence to a configuration error.
pub(crate) fn required_env(key: &str) -> Result<String, super::StorageError> {
    env::var(key).map_err(|_| super::StorageError::Config(format!("{key} must be set")))
}
