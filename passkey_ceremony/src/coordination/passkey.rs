use chrono::Utc;

use crate::session::{CeremonyKind, CeremonySession};
use crate::userdb::{Credential, UserIdentity, normalize_email};

use super::errors::CoordinationError;
use super::orchestrator::CeremonyOrchestrator;
use super::types::{CeremonyStart, FinishCeremony, LoginOutcome, RegistrationOutcome};

impl CeremonyOrchestrator {
    /// Starts registering a new credential for `identity`, creating the user
    /// on first contact.
    pub async fn begin_registration(
        &self,
        identity: UserIdentity,
    ) -> Result<CeremonyStart, CoordinationError> {
        let identity = identity.normalized()?;
        let user = self.credentials.get_or_create_user(&identity).await?;
        if !user.is_usable() {
            return Err(CoordinationError::Unauthorized.log());
        }

        let challenge = self.webauthn.begin_registration(&user).await?;
        let ceremony = CeremonySession::new(
            CeremonyKind::Registration,
            user.id.clone(),
            challenge.pending_state,
            self.config.ceremony_timeout,
        );
        let token = self.ceremonies.create(&ceremony).await?;

        tracing::debug!(user_id = %user.id, "Registration ceremony started");
        Ok(CeremonyStart {
            token,
            options: challenge.options,
            expires_at: ceremony.expires_at,
        })
    }

    pub async fn finish_registration(
        &self,
        request: FinishCeremony,
    ) -> Result<RegistrationOutcome, CoordinationError> {
        let ceremony = self
            .take_ceremony(&request.token, CeremonyKind::Registration)
            .await?;
        let user = self
            .bound_user(&ceremony, request.claimed_email.as_deref())
            .await?;

        let verified = self
            .webauthn
            .finish_registration(&user, &ceremony.pending_state, &request.response)
            .await?;

        let credential = Credential::new(
            verified.id,
            user.id.clone(),
            verified.public_key,
            verified.sign_count,
            verified.transports,
            request.label.unwrap_or_default(),
        );
        self.credentials.add_credential(&user.id, &credential).await?;

        tracing::info!(user_id = %user.id, credential_id = %credential.id, "Credential registered");
        Ok(RegistrationOutcome {
            user_id: user.id,
            credential_id: credential.id,
        })
    }

    /// Starts a login for an existing user with at least one credential.
    pub async fn begin_login(&self, email: &str) -> Result<CeremonyStart, CoordinationError> {
        let email = normalize_email(email)?;
        let user = self
            .credentials
            .get_user_by_email(&email)
            .await?
            .filter(|user| user.is_usable())
            .ok_or_else(|| CoordinationError::NotFound("User".to_string()).log())?;

        if user.credentials.is_empty() {
            return Err(CoordinationError::NotFound("Credential".to_string()).log());
        }

        let challenge = self.webauthn.begin_login(&user).await?;
        let ceremony = CeremonySession::new(
            CeremonyKind::Login,
            user.id.clone(),
            challenge.pending_state,
            self.config.ceremony_timeout,
        );
        let token = self.ceremonies.create(&ceremony).await?;

        tracing::debug!(user_id = %user.id, "Login ceremony started");
        Ok(CeremonyStart {
            token,
            options: challenge.options,
            expires_at: ceremony.expires_at,
        })
    }

    /// Verifies the assertion, records the new counter and issues a session.
    /// A counter that did not advance is reported, not refused.
    pub async fn finish_login(
        &self,
        request: FinishCeremony,
    ) -> Result<LoginOutcome, CoordinationError> {
        let ceremony = self
            .take_ceremony(&request.token, CeremonyKind::Login)
            .await?;
        let user = self
            .bound_user(&ceremony, request.claimed_email.as_deref())
            .await?;

        let verified = self
            .webauthn
            .finish_login(&user, &ceremony.pending_state, &request.response)
            .await?;

        let stored = user.credential(&verified.id).ok_or_else(|| {
            CoordinationError::VerificationFailed(
                "Credential does not belong to the user".to_string(),
            )
            .log()
        })?;

        let mut credential = stored.clone();
        credential.public_key = verified.public_key;
        credential.sign_count = verified.sign_count;
        if !verified.transports.is_empty() {
            credential.transports = verified.transports;
        }
        if let Some(label) = request.label {
            credential.label = label;
        }
        credential.last_used_at = Some(Utc::now());

        let update = self
            .credentials
            .update_credential(&user.id, &credential)
            .await?;
        if update.clone_warning_raised {
            tracing::warn!(
                user_id = %user.id,
                credential_id = %credential.id,
                stored_count = update.credential.sign_count,
                presented_count = credential.sign_count,
                "Signature counter did not advance; the authenticator may be cloned"
            );
        }

        let session = self.issue_session(&user.id).await?;
        Ok(LoginOutcome {
            session,
            clone_warning: update.clone_warning_raised,
        })
    }
}
