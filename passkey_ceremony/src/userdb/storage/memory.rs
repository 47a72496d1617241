use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::store_type::CredentialStore;
use crate::userdb::errors::UserError;
use crate::userdb::types::{Credential, CredentialUpdate, User, UserIdentity, counter_regressed};

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    /// email -> user id
    emails: HashMap<String, String>,
    /// credential id -> user id
    owners: HashMap<String, String>,
}

impl Inner {
    fn insert_user(&mut self, identity: &UserIdentity) -> User {
        let user = User::new(identity);
        self.emails.insert(user.email.clone(), user.id.clone());
        self.users.insert(user.id.clone(), user.clone());
        user
    }

    fn user_by_email(&self, email: &str) -> Option<&User> {
        self.emails.get(email).and_then(|id| self.users.get(id))
    }
}

/// Process-local store. Every mutation runs under one write lock, which also
/// serializes updates per user.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory credential store");
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn init(&self) -> Result<(), UserError> {
        Ok(())
    }

    async fn get_or_create_user(&self, identity: &UserIdentity) -> Result<User, UserError> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.user_by_email(&identity.email) {
            return Ok(user.clone());
        }
        tracing::debug!(email = %identity.email, "Creating user");
        Ok(inner.insert_user(identity))
    }

    async fn create_user(&self, identity: &UserIdentity) -> Result<User, UserError> {
        let mut inner = self.inner.write().await;
        if inner.emails.contains_key(&identity.email) {
            return Err(UserError::Conflict("User already exists".to_string()));
        }
        Ok(inner.insert_user(identity))
    }

    #[tracing::instrument(skip(self), fields(user_id = %id))]
    async fn get_user(&self, id: &str) -> Result<Option<User>, UserError> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    #[tracing::instrument(skip(self))]
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        Ok(self.inner.read().await.user_by_email(email).cloned())
    }

    async fn save_user(&self, user: &User) -> Result<(), UserError> {
        let mut inner = self.inner.write().await;
        let stored = inner.users.get_mut(&user.id).ok_or(UserError::NotFound)?;
        stored.name = user.name.clone();
        stored.display_name = user.display_name.clone();
        stored.is_active = user.is_active;
        stored.is_deleted = user.is_deleted;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn add_credential(
        &self,
        user_id: &str,
        credential: &Credential,
    ) -> Result<(), UserError> {
        let mut inner = self.inner.write().await;
        if inner.owners.contains_key(&credential.id) {
            return Err(UserError::Conflict("Credential already exists".to_string()));
        }
        let user = inner.users.get_mut(user_id).ok_or(UserError::NotFound)?;

        let mut credential = credential.clone();
        credential.user_id = user_id.to_string();
        user.credentials.push(credential.clone());
        user.updated_at = Utc::now();

        inner.owners.insert(credential.id, user_id.to_string());
        Ok(())
    }

    async fn update_credential(
        &self,
        user_id: &str,
        credential: &Credential,
    ) -> Result<CredentialUpdate, UserError> {
        let mut inner = self.inner.write().await;
        let user = inner.users.get_mut(user_id).ok_or(UserError::NotFound)?;
        let stored = user
            .credentials
            .iter_mut()
            .find(|c| c.id == credential.id)
            .ok_or(UserError::NotFound)?;

        let now = Utc::now();
        stored.updated_at = now;

        if counter_regressed(stored.sign_count, credential.sign_count) {
            stored.clone_warning = true;
            return Ok(CredentialUpdate {
                credential: stored.clone(),
                clone_warning_raised: true,
            });
        }

        stored.public_key = credential.public_key.clone();
        stored.sign_count = credential.sign_count;
        stored.transports = credential.transports.clone();
        stored.label = credential.label.clone();
        stored.last_used_at = credential.last_used_at.or(Some(now));

        Ok(CredentialUpdate {
            credential: stored.clone(),
            clone_warning_raised: false,
        })
    }

    async fn remove_credential(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<(), UserError> {
        let mut inner = self.inner.write().await;
        if inner.owners.get(credential_id).map(String::as_str) != Some(user_id) {
            return Ok(());
        }
        inner.owners.remove(credential_id);
        if let Some(user) = inner.users.get_mut(user_id) {
            user.credentials.retain(|c| c.id != credential_id);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_credential(&self, credential_id: &str) -> Result<Option<Credential>, UserError> {
        let inner = self.inner.read().await;
        Ok(inner
            .owners
            .get(credential_id)
            .and_then(|owner| inner.users.get(owner))
            .and_then(|user| user.credential(credential_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::userdb::storage::tests_common;

    #[tokio::test]
    async fn test_memory_store_contract() {
        tests_common::run_contract(&InMemoryCredentialStore::new()).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_get_or_create_yields_one_user() {
        tests_common::concurrent_get_or_create(std::sync::Arc::new(
            InMemoryCredentialStore::new(),
        ))
        .await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_credential_keeps_every_key() {
        tests_common::concurrent_add_credentials(std::sync::Arc::new(
            InMemoryCredentialStore::new(),
        ))
        .await;
    }
}
