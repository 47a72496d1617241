use sqlx::{Pool, Postgres};

use crate::storage::config::DB_TABLE_SESSIONS;
use crate::storage::errors::StorageError;
use crate::storage::schema_validation::validate_postgres_table_schema;
use crate::storage::types::CacheData;

use super::SessionRow;

pub(super) async fn create_tables(pool: &Pool<Postgres>) -> Result<(), StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            category TEXT NOT NULL,
            token TEXT NOT NULL,
            user_id TEXT,
            value TEXT NOT NULL,
            created_at BIGINT NOT NULL,
            expires_at BIGINT NOT NULL,
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

pub(super) async fn validate_tables(pool: &Pool<Postgres>) -> Result<(), StorageError> {
    let expected_columns = [
        ("category", "text"),
        ("token", "text"),
        ("user_id", "text"),
        ("value", "text"),
        ("created_at", "bigint"),
        ("expires_at", "bigint"),
    ];

    validate_postgres_table_schema(
        pool,
        DB_TABLE_SESSIONS.as_str(),
        &expected_columns,
        StorageError::Storage,
    )
    .await
}

pub(super) async fn upsert(
    pool: &Pool<Postgres>,
    category: &str,
    token: &str,
    value: &CacheData,
    only_if_absent: bool,
) -> Result<bool, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();
    let now = chrono::Utc::now().timestamp_millis();
    let guard = if only_if_absent {
        format!("WHERE {table_name}.expires_at <= $7")
    } else {
        String::new()
    };

    let sql = format!(
        r#"
        INSERT INTO {table_name} (category, token, user_id, value, created_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (category, token) DO UPDATE SET
            user_id = EXCLUDED.user_id,
            value = EXCLUDED.value,
            created_at = EXCLUDED.created_at,
            expires_at = EXCLUDED.expires_at
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
    pool: &Pool<Postgres>,
    category: &str,
    token: &str,
) -> Result<Option<SessionRow>, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let row = sqlx::query_as::<_, SessionRow>(&format!(
        r#"
        SELECT user_id, value, expires_at FROM {table_name}
        WHERE category = $1 AND token = $2
        "#
    ))
    .bind(category)
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub(super) async fn take(
    pool: &Pool<Postgres>,
    category: &str,
    token: &str,
) -> Result<Option<SessionRow>, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let row = sqlx::query_as::<_, SessionRow>(&format!(
        r#"
        DELETE FROM {table_name}
        WHERE category = $1 AND token = $2
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
    pool: &Pool<Postgres>,
    category: &str,
    token: &str,
) -> Result<(), StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"DELETE FROM {table_name} WHERE category = $1 AND token = $2"#
    ))
    .bind(category)
    .bind(token)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn purge_expired(pool: &Pool<Postgres>, now: i64) -> Result<usize, StorageError> {
    let table_name = DB_TABLE_SESSIONS.as_str();

    let result = sqlx::query(&format!(
        r#"DELETE FROM {table_name} WHERE expires_at <= $1"#
    ))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() as usize)
}
