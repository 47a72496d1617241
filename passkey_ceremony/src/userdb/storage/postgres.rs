use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::storage::{DB_TABLE_CREDENTIALS, DB_TABLE_USERS, validate_postgres_table_schema};
use crate::userdb::errors::{UserError, map_insert_error};
use crate::userdb::types::{Credential, User};

use super::sql::{CredentialRow, UserLookup, UserRow, assemble_user, encode_transports};

// PostgreSQL implementations
pub(super) async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {users_table} (
            id TEXT PRIMARY KEY NOT NULL,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            display_name TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT true,
            is_deleted BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {credentials_table} (
            credential_id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL REFERENCES {users_table}(id),
            public_key BYTEA NOT NULL,
            sign_count BIGINT NOT NULL DEFAULT 0,
            clone_warning BOOLEAN NOT NULL DEFAULT false,
            transports TEXT NOT NULL,
            label TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            last_used_at TIMESTAMPTZ
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    sqlx::query(&format!(
        r#"
        CREATE INDEX IF NOT EXISTS idx_{credentials_table}_user_id ON {credentials_table}(user_id)
        "#
    ))
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

/// Validates that the user and credential table schemas match what we expect
pub(super) async fn validate_tables_postgres(pool: &Pool<Postgres>) -> Result<(), UserError> {
    let user_columns = [
        ("id", "text"),
        ("email", "text"),
        ("name", "text"),
        ("display_name", "text"),
        ("is_active", "boolean"),
        ("is_deleted", "boolean"),
        ("created_at", "timestamp with time zone"),
        ("updated_at", "timestamp with time zone"),
    ];
    validate_postgres_table_schema(
        pool,
        DB_TABLE_USERS.as_str(),
        &user_columns,
        UserError::Storage,
    )
    .await?;

    let credential_columns = [
        ("credential_id", "text"),
        ("user_id", "text"),
        ("public_key", "bytea"),
        ("sign_count", "bigint"),
        ("clone_warning", "boolean"),
        ("transports", "text"),
        ("label", "text"),
        ("created_at", "timestamp with time zone"),
        ("updated_at", "timestamp with time zone"),
        ("last_used_at", "timestamp with time zone"),
    ];
    validate_postgres_table_schema(
        pool,
        DB_TABLE_CREDENTIALS.as_str(),
        &credential_columns,
        UserError::Storage,
    )
    .await
}

pub(super) async fn get_user_postgres(
    pool: &Pool<Postgres>,
    lookup: UserLookup<'_>,
) -> Result<Option<User>, UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    let (column, value) = match lookup {
        UserLookup::Id(id) => ("id", id),
        UserLookup::Email(email) => ("email", email),
    };

    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        SELECT id, email, name, display_name, is_active, is_deleted, created_at, updated_at
        FROM {users_table} WHERE {column} = $1
        "#
    ))
    .bind(value)
    .fetch_optional(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let credentials = credentials_for_user_postgres(pool, &row.id).await?;
    assemble_user(row, credentials).map(Some)
}

async fn credentials_for_user_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<Vec<CredentialRow>, UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query_as::<_, CredentialRow>(&format!(
        r#"
        SELECT * FROM {credentials_table} WHERE user_id = $1
        ORDER BY created_at ASC, credential_id ASC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))
}

pub(super) async fn insert_user_postgres(
    pool: &Pool<Postgres>,
    user: &User,
    if_absent: bool,
) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();
    let on_conflict = if if_absent {
        "ON CONFLICT (email) DO NOTHING"
    } else {
        ""
    };

    sqlx::query(&format!(
        r#"
        INSERT INTO {users_table}
            (id, email, name, display_name, is_active, is_deleted, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        {on_conflict}
        "#
    ))
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.display_name)
    .bind(user.is_active)
    .bind(user.is_deleted)
    .bind(user.created_at)
    .bind(user.updated_at)
    .execute(pool)
    .await
    .map_err(|e| map_insert_error(e, "User"))?;

    Ok(())
}

pub(super) async fn update_user_postgres(
    pool: &Pool<Postgres>,
    user: &User,
) -> Result<bool, UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    let result = sqlx::query(&format!(
        r#"
        UPDATE {users_table}
        SET name = $1, display_name = $2, is_active = $3, is_deleted = $4, updated_at = $5
        WHERE id = $6
        "#
    ))
    .bind(&user.name)
    .bind(&user.display_name)
    .bind(user.is_active)
    .bind(user.is_deleted)
    .bind(Utc::now())
    .bind(&user.id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn insert_credential_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    credential: &Credential,
) -> Result<(), UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {credentials_table}
            (credential_id, user_id, public_key, sign_count, clone_warning, transports,
             label, created_at, updated_at, last_used_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#
    ))
    .bind(&credential.id)
    .bind(user_id)
    .bind(&credential.public_key)
    .bind(i64::from(credential.sign_count))
    .bind(credential.clone_warning)
    .bind(encode_transports(credential)?)
    .bind(&credential.label)
    .bind(credential.created_at)
    .bind(credential.updated_at)
    .bind(credential.last_used_at)
    .execute(pool)
    .await
    .map_err(|e| map_insert_error(e, "Credential"))?;

    Ok(())
}

/// Applies the update only if the counter advances (or stays at the 0/0
/// no-counter value). Returns whether a row changed.
pub(super) async fn advance_credential_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    credential: &Credential,
    now: DateTime<Utc>,
) -> Result<bool, UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();
    let sign_count = i64::from(credential.sign_count);

    let result = sqlx::query(&format!(
        r#"
        UPDATE {credentials_table}
        SET public_key = $1, sign_count = $2, transports = $3, label = $4,
            updated_at = $5, last_used_at = $6
        WHERE credential_id = $7 AND user_id = $8
          AND (sign_count < $9 OR (sign_count = 0 AND $10 = 0))
        "#
    ))
    .bind(&credential.public_key)
    .bind(sign_count)
    .bind(encode_transports(credential)?)
    .bind(&credential.label)
    .bind(now)
    .bind(credential.last_used_at.unwrap_or(now))
    .bind(&credential.id)
    .bind(user_id)
    .bind(sign_count)
    .bind(sign_count)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn flag_clone_warning_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    credential_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    let result = sqlx::query(&format!(
        r#"
        UPDATE {credentials_table} SET clone_warning = $1, updated_at = $2
        WHERE credential_id = $3 AND user_id = $4
        "#
    ))
    .bind(true)
    .bind(now)
    .bind(credential_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn delete_credential_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    credential_id: &str,
) -> Result<(), UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"DELETE FROM {credentials_table} WHERE credential_id = $1 AND user_id = $2"#
    ))
    .bind(credential_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_credential_postgres(
    pool: &Pool<Postgres>,
    credential_id: &str,
) -> Result<Option<Credential>, UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query_as::<_, CredentialRow>(&format!(
        r#"SELECT * FROM {credentials_table} WHERE credential_id = $1"#
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?
    .map(Credential::try_from)
    .transpose()
}
