use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

use crate::storage::{DB_TABLE_CREDENTIALS, DB_TABLE_USERS, validate_sqlite_table_schema};
use crate::userdb::errors::{UserError, map_insert_error};
use crate::userdb::types::{Credential, User};

use super::sql::{CredentialRow, UserLookup, UserRow, assemble_user, encode_transports};

// SQLite implementations
pub(super) async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), UserError> {
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
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
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
            public_key BLOB NOT NULL,
            sign_count INTEGER NOT NULL DEFAULT 0,
            clone_warning BOOLEAN NOT NULL DEFAULT false,
            transports TEXT NOT NULL,
            label TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL,
            last_used_at TIMESTAMP
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
pub(super) async fn validate_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), UserError> {
    let user_columns = [
        ("id", "TEXT"),
        ("email", "TEXT"),
        ("name", "TEXT"),
        ("display_name", "TEXT"),
        ("is_active", "BOOLEAN"),
        ("is_deleted", "BOOLEAN"),
        ("created_at", "TIMESTAMP"),
        ("updated_at", "TIMESTAMP"),
    ];
    validate_sqlite_table_schema(pool, DB_TABLE_USERS.as_str(), &user_columns, UserError::Storage)
        .await?;

    let credential_columns = [
        ("credential_id", "TEXT"),
        ("user_id", "TEXT"),
        ("public_key", "BLOB"),
        ("sign_count", "INTEGER"),
        ("clone_warning", "BOOLEAN"),
        ("transports", "TEXT"),
        ("label", "TEXT"),
        ("created_at", "TIMESTAMP"),
        ("updated_at", "TIMESTAMP"),
        ("last_used_at", "TIMESTAMP"),
    ];
    validate_sqlite_table_schema(
        pool,
        DB_TABLE_CREDENTIALS.as_str(),
        &credential_columns,
        UserError::Storage,
    )
    .await
}

pub(super) async fn get_user_sqlite(
    pool: &Pool<Sqlite>,
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
        FROM {users_table} WHERE {column} = ?
        "#
    ))
    .bind(value)
    .fetch_optional(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let credentials = credentials_for_user_sqlite(pool, &row.id).await?;
    assemble_user(row, credentials).map(Some)
}

async fn credentials_for_user_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Vec<CredentialRow>, UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query_as::<_, CredentialRow>(&format!(
        r#"
        SELECT * FROM {credentials_table} WHERE user_id = ?
        ORDER BY created_at ASC, credential_id ASC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))
}

pub(super) async fn insert_user_sqlite(
    pool: &Pool<Sqlite>,
    user: &User,
    if_absent: bool,
) -> Result<(), UserError> {
    let users_table = DB_TABLE_USERS.as_str();
    let on_conflict = if if_absent {
        "ON CONFLICT(email) DO NOTHING"
    } else {
        ""
    };

    sqlx::query(&format!(
        r#"
        INSERT INTO {users_table}
            (id, email, name, display_name, is_active, is_deleted, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
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

pub(super) async fn update_user_sqlite(
    pool: &Pool<Sqlite>,
    user: &User,
) -> Result<bool, UserError> {
    let users_table = DB_TABLE_USERS.as_str();

    let result = sqlx::query(&format!(
        r#"
        UPDATE {users_table}
        SET name = ?, display_name = ?, is_active = ?, is_deleted = ?, updated_at = ?
        WHERE id = ?
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

pub(super) async fn insert_credential_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    credential: &Credential,
) -> Result<(), UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {credentials_table}
            (credential_id, user_id, public_key, sign_count, clone_warning, transports,
             label, created_at, updated_at, last_used_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
pub(super) async fn advance_credential_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    credential: &Credential,
    now: DateTime<Utc>,
) -> Result<bool, UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();
    let sign_count = i64::from(credential.sign_count);

    let result = sqlx::query(&format!(
        r#"
        UPDATE {credentials_table}
        SET public_key = ?, sign_count = ?, transports = ?, label = ?,
            updated_at = ?, last_used_at = ?
        WHERE credential_id = ? AND user_id = ?
          AND (sign_count < ? OR (sign_count = 0 AND ? = 0))
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

pub(super) async fn flag_clone_warning_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    credential_id: &str,
    now: DateTime<Utc>,
) -> Result<bool, UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    let result = sqlx::query(&format!(
        r#"
        UPDATE {credentials_table} SET clone_warning = ?, updated_at = ?
        WHERE credential_id = ? AND user_id = ?
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

pub(super) async fn delete_credential_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    credential_id: &str,
) -> Result<(), UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query(&format!(
        r#"DELETE FROM {credentials_table} WHERE credential_id = ? AND user_id = ?"#
    ))
    .bind(credential_id)
    .bind(user_id)
    .execute(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?;

    Ok(())
}

pub(super) async fn get_credential_sqlite(
    pool: &Pool<Sqlite>,
    credential_id: &str,
) -> Result<Option<Credential>, UserError> {
    let credentials_table = DB_TABLE_CREDENTIALS.as_str();

    sqlx::query_as::<_, CredentialRow>(&format!(
        r#"SELECT * FROM {credentials_table} WHERE credential_id = ?"#
    ))
    .bind(credential_id)
    .fetch_optional(pool)
    .await
    .map_err(|e| UserError::Storage(e.to_string()))?
    .map(Credential::try_from)
    .transpose()
}
