use std::sync::Arc;

use crate::config::CeremonyConfig;
use crate::provider::{Notifier, WebAuthnProvider};
use crate::session::{
    AuthenticatedSession, CeremonyKind, CeremonySession, SessionStore, SessionValue,
    VerificationCode,
};
use crate::storage::SharedCacheStore;
use crate::userdb::{CredentialStore, User, normalize_email};

use super::errors::CoordinationError;
use super::types::SessionGrant;

const CEREMONY_PREFIX: &str = "ceremony";
const SESSION_PREFIX: &str = "session";
const SIGNUP_CODE_PREFIX: &str = "signup_code";
const LOGIN_CODE_PREFIX: &str = "login_code";

/// Drives registration, login and code-based flows over explicitly supplied
/// stores and capabilities.
///
/// Cheap to share behind an `Arc`; every operation takes `&self`.
pub struct CeremonyOrchestrator {
    pub(super) credentials: Arc<dyn CredentialStore>,
    pub(super) ceremonies: SessionStore<CeremonySession>,
    pub(super) sessions: SessionStore<AuthenticatedSession>,
    pub(super) signup_codes: SessionStore<VerificationCode>,
    pub(super) login_codes: SessionStore<VerificationCode>,
    pub(super) webauthn: Arc<dyn WebAuthnProvider>,
    pub(super) notifier: Arc<dyn Notifier>,
    pub(super) config: CeremonyConfig,
}

impl CeremonyOrchestrator {
    /// All ephemeral state shares `cache`, separated by prefix.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        cache: SharedCacheStore,
        webauthn: Arc<dyn WebAuthnProvider>,
        notifier: Arc<dyn Notifier>,
        config: CeremonyConfig,
    ) -> Self {
        Self {
            credentials,
            ceremonies: SessionStore::new(CEREMONY_PREFIX, cache.clone()),
            sessions: SessionStore::new(SESSION_PREFIX, cache.clone()),
            signup_codes: SessionStore::new(SIGNUP_CODE_PREFIX, cache.clone()),
            login_codes: SessionStore::new(LOGIN_CODE_PREFIX, cache),
            webauthn,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &CeremonyConfig {
        &self.config
    }

    /// Consumes the ceremony token. The token is gone afterwards whatever the
    /// outcome, so a failed finish cannot be retried with it.
    pub(super) async fn take_ceremony(
        &self,
        token: &str,
        kind: CeremonyKind,
    ) -> Result<CeremonySession, CoordinationError> {
        let ceremony = self
            .ceremonies
            .consume(token)
            .await?
            .ok_or_else(|| CoordinationError::NotFound("Ceremony".to_string()).log())?;

        if ceremony.is_expired() {
            return Err(CoordinationError::Expired("Ceremony".to_string()).log());
        }
        if ceremony.kind != kind {
            return Err(CoordinationError::InvalidRequest(format!(
                "Token belongs to a {} ceremony, not {kind}",
                ceremony.kind
            ))
            .log());
        }
        Ok(ceremony)
    }

    /// Loads the user a ceremony was begun for and checks any identity the
    /// client claims against it.
    pub(super) async fn bound_user(
        &self,
        ceremony: &CeremonySession,
        claimed_email: Option<&str>,
    ) -> Result<User, CoordinationError> {
        let user = self
            .credentials
            .get_user(&ceremony.user_id)
            .await?
            .ok_or_else(|| CoordinationError::NotFound("User".to_string()).log())?;

        if let Some(claimed) = claimed_email {
            if normalize_email(claimed)? != user.email {
                return Err(CoordinationError::InvalidRequest(
                    "Identity does not match the ceremony".to_string(),
                )
                .log());
            }
        }
        if !user.is_usable() {
            return Err(CoordinationError::Unauthorized.log());
        }
        Ok(user)
    }

    pub(super) async fn issue_session(
        &self,
        user_id: &str,
    ) -> Result<SessionGrant, CoordinationError> {
        let session = AuthenticatedSession::new(user_id.to_string(), self.config.session_timeout);
        let token = self.sessions.create(&session).await?;
        tracing::info!(user_id, "Issued authenticated session");
        Ok(SessionGrant {
            token,
            user_id: session.user_id,
            expires_at: session.expires_at,
        })
    }

    /// Deletes the session. Unknown or already expired tokens are fine.
    pub async fn logout(&self, session_token: &str) -> Result<(), CoordinationError> {
        self.sessions.delete(session_token).await?;
        tracing::debug!("Session deleted");
        Ok(())
    }

    pub async fn authorize(
        &self,
        session_token: &str,
    ) -> Result<AuthenticatedSession, CoordinationError> {
        match self.sessions.get(session_token).await? {
            Some(session) if !session.is_expired() => Ok(session),
            _ => Err(CoordinationError::Unauthorized),
        }
    }

    pub async fn current_user(&self, session_token: &str) -> Result<User, CoordinationError> {
        let session = self.authorize(session_token).await?;
        match self.credentials.get_user(&session.user_id).await? {
            Some(user) if user.is_usable() => Ok(user),
            _ => Err(CoordinationError::Unauthorized.log()),
        }
    }

    /// Labels of the credentials registered for `email`.
    pub async fn list_credential_labels(
        &self,
        email: &str,
    ) -> Result<Vec<String>, CoordinationError> {
        let email = normalize_email(email)?;
        let user = self
            .credentials
            .get_user_by_email(&email)
            .await?
            .ok_or_else(|| CoordinationError::NotFound("User".to_string()))?;

        Ok(user.credentials.into_iter().map(|c| c.label).collect())
    }

    /// Removes one of the session owner's credentials. The owner must still be
    /// usable. Credentials of other users are reported as not found.
    pub async fn remove_credential(
        &self,
        session_token: &str,
        credential_id: &str,
    ) -> Result<(), CoordinationError> {
        let user = self.current_user(session_token).await?;

        match self.credentials.get_credential(credential_id).await? {
            Some(credential) if credential.user_id == user.id => {
                self.credentials
                    .remove_credential(&user.id, credential_id)
                    .await?;
                tracing::info!(user_id = %user.id, credential_id, "Credential removed");
                Ok(())
            }
            _ => Err(CoordinationError::NotFound("Credential".to_string()).log()),
        }
    }

    /// Reclaims expired ceremonies, sessions and codes from the shared backend.
    pub async fn purge_expired(&self) -> Result<usize, CoordinationError> {
        let removed = self.ceremonies.purge_expired().await?;
        if removed > 0 {
            tracing::debug!(removed, "Purged expired entries");
        }
        Ok(removed)
    }
}
