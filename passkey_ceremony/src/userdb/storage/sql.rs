use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::postgres::*;
use super::sqlite::*;
use super::store_type::CredentialStore;
use crate::storage::DataStore;
use crate::userdb::errors::UserError;
use crate::userdb::types::{Credential, CredentialUpdate, User, UserIdentity};

/// Users and credentials in SQLite or PostgreSQL.
///
/// Counter updates are single-statement compare-and-set on the credential
/// row, so concurrent logins with the same credential cannot both advance
/// from the same stored counter.
pub struct SqlCredentialStore {
    store: Arc<dyn DataStore>,
}

impl SqlCredentialStore {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        tracing::info!("Creating new relational credential store");
        Self { store }
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) enum UserLookup<'a> {
    Id(&'a str),
    Email(&'a str),
}

#[derive(sqlx::FromRow)]
pub(super) struct UserRow {
    pub(super) id: String,
    pub(super) email: String,
    pub(super) name: String,
    pub(super) display_name: String,
    pub(super) is_active: bool,
    pub(super) is_deleted: bool,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
pub(super) struct CredentialRow {
    pub(super) credential_id: String,
    pub(super) user_id: String,
    pub(super) public_key: Vec<u8>,
    pub(super) sign_count: i64,
    pub(super) clone_warning: bool,
    pub(super) transports: String,
    pub(super) label: String,
    pub(super) created_at: DateTime<Utc>,
    pub(super) updated_at: DateTime<Utc>,
    pub(super) last_used_at: Option<DateTime<Utc>>,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = UserError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        let sign_count = u32::try_from(row.sign_count).map_err(|_| {
            UserError::InvalidData(format!("Invalid sign_count: {}", row.sign_count))
        })?;

        Ok(Credential {
            id: row.credential_id,
            user_id: row.user_id,
            public_key: row.public_key,
            sign_count,
            clone_warning: row.clone_warning,
            transports: serde_json::from_str(&row.transports)?,
            label: row.label,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_used_at: row.last_used_at,
        })
    }
}

pub(super) fn assemble_user(row: UserRow, credentials: Vec<CredentialRow>) -> Result<User, UserError> {
    Ok(User {
        id: row.id,
        email: row.email,
        name: row.name,
        display_name: row.display_name,
        is_active: row.is_active,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
        updated_at: row.updated_at,
        credentials: credentials
            .into_iter()
            .map(Credential::try_from)
            .collect::<Result<Vec<_>, _>>()?,
    })
}

pub(super) fn encode_transports(credential: &Credential) -> Result<String, UserError> {
    Ok(serde_json::to_string(&credential.transports)?)
}

fn unsupported() -> UserError {
    UserError::Storage("Unsupported database type".to_string())
}

impl SqlCredentialStore {
    async fn lookup(&self, lookup: UserLookup<'_>) -> Result<Option<User>, UserError> {
        let result = if let Some(pool) = self.store.as_sqlite() {
            get_user_sqlite(pool, lookup).await
        } else if let Some(pool) = self.store.as_postgres() {
            get_user_postgres(pool, lookup).await
        } else {
            Err(unsupported())
        };

        match &result {
            Ok(Some(_)) => tracing::debug!(found = true, "User lookup completed"),
            Ok(None) => tracing::debug!(found = false, "User lookup completed - not found"),
            Err(e) => tracing::error!(error = %e, "User lookup failed"),
        }

        result
    }

    async fn insert_user(&self, user: &User, if_absent: bool) -> Result<(), UserError> {
        if let Some(pool) = self.store.as_sqlite() {
            insert_user_sqlite(pool, user, if_absent).await
        } else if let Some(pool) = self.store.as_postgres() {
            insert_user_postgres(pool, user, if_absent).await
        } else {
            Err(unsupported())
        }
    }

    async fn require_user(&self, user_id: &str) -> Result<(), UserError> {
        match self.lookup(UserLookup::Id(user_id)).await? {
            Some(_) => Ok(()),
            None => Err(UserError::NotFound),
        }
    }
}

#[async_trait]
impl CredentialStore for SqlCredentialStore {
    async fn init(&self) -> Result<(), UserError> {
        if let Some(pool) = self.store.as_sqlite() {
            create_tables_sqlite(pool).await?;
            validate_tables_sqlite(pool).await
        } else if let Some(pool) = self.store.as_postgres() {
            create_tables_postgres(pool).await?;
            validate_tables_postgres(pool).await
        } else {
            Err(unsupported())
        }
    }

    #[tracing::instrument(skip(self, identity), fields(email = %identity.email))]
    async fn get_or_create_user(&self, identity: &UserIdentity) -> Result<User, UserError> {
        if let Some(user) = self.lookup(UserLookup::Email(&identity.email)).await? {
            return Ok(user);
        }

        // A concurrent insert for the same email makes this a no-op; the
        // lookup below then returns the winner.
        self.insert_user(&User::new(identity), true).await?;

        self.lookup(UserLookup::Email(&identity.email))
            .await?
            .ok_or_else(|| UserError::Storage("User vanished after insert".to_string()))
    }

    #[tracing::instrument(skip(self, identity), fields(email = %identity.email))]
    async fn create_user(&self, identity: &UserIdentity) -> Result<User, UserError> {
        let user = User::new(identity);
        self.insert_user(&user, false).await?;
        Ok(user)
    }

    #[tracing::instrument(skip(self), fields(user_id = %id))]
    async fn get_user(&self, id: &str) -> Result<Option<User>, UserError> {
        self.lookup(UserLookup::Id(id)).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        self.lookup(UserLookup::Email(email)).await
    }

    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    async fn save_user(&self, user: &User) -> Result<(), UserError> {
        let updated = if let Some(pool) = self.store.as_sqlite() {
            update_user_sqlite(pool, user).await?
        } else if let Some(pool) = self.store.as_postgres() {
            update_user_postgres(pool, user).await?
        } else {
            return Err(unsupported());
        };

        if updated { Ok(()) } else { Err(UserError::NotFound) }
    }

    #[tracing::instrument(skip(self, credential), fields(credential_id = %credential.id))]
    async fn add_credential(
        &self,
        user_id: &str,
        credential: &Credential,
    ) -> Result<(), UserError> {
        self.require_user(user_id).await?;

        if let Some(pool) = self.store.as_sqlite() {
            insert_credential_sqlite(pool, user_id, credential).await
        } else if let Some(pool) = self.store.as_postgres() {
            insert_credential_postgres(pool, user_id, credential).await
        } else {
            Err(unsupported())
        }
    }

    #[tracing::instrument(skip(self, credential), fields(credential_id = %credential.id))]
    async fn update_credential(
        &self,
        user_id: &str,
        credential: &Credential,
    ) -> Result<CredentialUpdate, UserError> {
        let now = Utc::now();

        let (advanced, flagged) = if let Some(pool) = self.store.as_sqlite() {
            if advance_credential_sqlite(pool, user_id, credential, now).await? {
                (true, false)
            } else {
                let flagged = flag_clone_warning_sqlite(pool, user_id, &credential.id, now).await?;
                (false, flagged)
            }
        } else if let Some(pool) = self.store.as_postgres() {
            if advance_credential_postgres(pool, user_id, credential, now).await? {
                (true, false)
            } else {
                let flagged =
                    flag_clone_warning_postgres(pool, user_id, &credential.id, now).await?;
                (false, flagged)
            }
        } else {
            return Err(unsupported());
        };

        if !advanced && !flagged {
            return Err(UserError::NotFound);
        }

        let stored = self
            .get_credential(&credential.id)
            .await?
            .ok_or(UserError::NotFound)?;

        Ok(CredentialUpdate {
            credential: stored,
            clone_warning_raised: flagged,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn remove_credential(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<(), UserError> {
        if let Some(pool) = self.store.as_sqlite() {
            delete_credential_sqlite(pool, user_id, credential_id).await
        } else if let Some(pool) = self.store.as_postgres() {
            delete_credential_postgres(pool, user_id, credential_id).await
        } else {
            Err(unsupported())
        }
    }

    #[tracing::instrument(skip(self))]
    async fn get_credential(&self, credential_id: &str) -> Result<Option<Credential>, UserError> {
        if let Some(pool) = self.store.as_sqlite() {
            get_credential_sqlite(pool, credential_id).await
        } else if let Some(pool) = self.store.as_postgres() {
            get_credential_postgres(pool, credential_id).await
        } else {
            Err(unsupported())
        }
    }
}
