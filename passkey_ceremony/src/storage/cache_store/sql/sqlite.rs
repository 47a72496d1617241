use sqlx::{Pool, Sqlite};

use crate::storage::config::DB_TABLE_SESSIONS;
use crate::storage::errors::StorageError;
use crate::storage::schema_validation::validate_sqlite_table_schema;
use crate::storage::types::CacheData;

use super::SessionRow;

pub(super) async fn create_tables(pool: &Pool<Sqlite>) -> Result<(), StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            category TEXT NOT NULL,
            token TEXT NOT NULL,
            user_id TEXT,
            value TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            PRIMARY KEY (category, token)
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{table_name}_expires_at ON {table_name}(expires_at)
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_tables(pool: &Pool<Sqlite>) -> Result<(), StorageError> {
    let expected_columns = [
        ("category", "TEXT"),
        ("token", "TEXT"),
        ("user_id", "TEXT"),
        ("value", "TEXT"),
        ("created_at", "INTEGER"),
        ("expires_at", "INTEGER"),
    ];

    validate_sqlite_table_schema(
        pool,
        DB_TABLE_SESSIONS.as_str(),
        &expected_columns,
        StorageError::Storage,
    )
    .await
}

/// Inserts the row. With `only_if_absent`, an existing live row wins and
/// `false` is returned; an expired row is overwritten.
pub(super) async fn upsert(
    pool: &Pool<Sqlite>,
    category: &str,
    token: &str,
    value: &CacheData,
    only_if_absent: bool,
) -> Result<bool, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();
    let now = chrono::Utc::now().timestamp_millis();
    let guard = if only_if_absent {
        format!("WHERE {table_name}.expires_at <= ?")
    } else {
        String::new()
    };

    let sql = format!(
        r#"
        INSERT INTO {table_name} (category, token, user_id, value, created_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(category, token) DO UPDATE SET
            user_id = excluded.user_id,
            value = excluded.value,
            created_at = excluded.created_at,
            expires_at = excluded.expires_at
        {guard}
        "#
    );

    let mut query = sqlx::query(&sql)
        .bind(category)
        .bind(token)
        .bind(value.user_id.as_deref())
        .bind(&value.value)
        .bind(now)
        .bind(value.expires_at.timestamp_millis());

    if only_if_absent {
        query = query.bind(now);
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected() == 1)
}

pub(super) async fn get(
    pool: &Pool<Sqlite>,
    category: &str,
    token: &str,
) -> Result<Option<SessionRow>, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let row = sqlx::query_as::<_, SessionRow>(&format!(
        r#"
        SELECT user_id, value, expires_at FROM {table_name}
        WHERE category = ? AND token = ?
        "#
    ))
    .bind(category)
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub(super) async fn take(
    pool: &Pool<Sqlite>,
    category: &str,
    token: &str,
) -> Result<Option<SessionRow>, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let row = sqlx::query_as::<_, SessionRow>(&format!(
        r#"
        DELETE FROM {table_name}
        WHERE category = ? AND token = ?
        RETURNING user_id, value, expires_at
        "#
    ))
    .bind(category)
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub(super) async fn remove(
    pool: &Pool<Sqlite>,
    category: &str,
    token: &str,
) -> Result<(), StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"DELETE FROM {table_name} WHERE category = ? AND token = ?"#
    ))
    .bind(category)
    .bind(token)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn purge_expired(pool: &Pool<Sqlite>, now: i64) -> Result<usize, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let result = sqlx::query(&format!(
        r#"DELETE FROM {table_name} WHERE expires_at <= ?"#
    ))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}
