use async_trait::async_trait;

use crate::userdb::errors::UserError;
use crate::userdb::types::{Credential, CredentialUpdate, User, UserIdentity};

/// Durable record of users and their credentials.
///
/// Identities passed in are expected to be normalized already.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create tables or other structures the store needs.
    async fn init(&self) -> Result<(), UserError>;

    /// Look the user up by email, creating it if absent. Concurrent calls for
    /// the same email yield the same user.
    async fn get_or_create_user(&self, identity: &UserIdentity) -> Result<User, UserError>;

    /// Create a user, failing with `Conflict` if the email is taken.
    async fn create_user(&self, identity: &UserIdentity) -> Result<User, UserError>;

    async fn get_user(&self, id: &str) -> Result<Option<User>, UserError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, UserError>;

    /// Persist profile fields (names and flags). Email and credentials are
    /// left untouched.
    async fn save_user(&self, user: &User) -> Result<(), UserError>;

    /// `Conflict` if the credential id exists for any user, `NotFound` if the
    /// user does not exist.
    async fn add_credential(
        &self,
        user_id: &str,
        credential: &Credential,
    ) -> Result<(), UserError>;

    /// Replace the stored credential after a successful assertion. A counter
    /// that did not advance sets `clone_warning` instead and keeps the stored
    /// counter and key.
    async fn update_credential(
        &self,
        user_id: &str,
        credential: &Credential,
    ) -> Result<CredentialUpdate, UserError>;

    /// Idempotent.
    async fn remove_credential(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<(), UserError>;

    async fn get_credential(&self, credential_id: &str) -> Result<Option<Credential>, UserError>;
}
