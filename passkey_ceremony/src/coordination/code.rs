use crate::session::{CodePurpose, SessionStore, SessionValue, VerificationCode};
use crate::userdb::{User, UserIdentity, normalize_email};

use super::errors::CoordinationError;
use super::orchestrator::CeremonyOrchestrator;
use super::types::SessionGrant;

const MAX_CODE_ATTEMPTS: usize = 5;

impl CeremonyOrchestrator {
    /// Mails a signup code for a new account. The profile waits under the code
    /// until it is redeemed.
    pub async fn begin_signup_with_code(
        &self,
        identity: UserIdentity,
    ) -> Result<(), CoordinationError> {
        let identity = identity.normalized()?;
        if self
            .credentials
            .get_user_by_email(&identity.email)
            .await?
            .is_some()
        {
            return Err(CoordinationError::Conflict("Email already registered".to_string()).log());
        }

        let pending = VerificationCode::new(
            identity.email.clone(),
            CodePurpose::Signup {
                name: identity.name,
                display_name: identity.display_name,
            },
            self.config.verification_code_timeout,
        );
        let code = self.store_code(&pending).await?;

        self.deliver_code(&pending, &code, "Your signup code").await?;
        tracing::debug!(email = %pending.email, "Signup code sent");
        Ok(())
    }

    pub async fn finish_signup_with_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<User, CoordinationError> {
        let email = normalize_email(email)?;
        let pending = self.redeem_code(&self.signup_codes, &email, code).await?;

        let CodePurpose::Signup { name, display_name } = pending.purpose else {
            return Err(CoordinationError::InvalidRequest("Invalid code".to_string()).log());
        };

        let identity = UserIdentity::new(email, name, display_name);
        let user = self.credentials.create_user(&identity).await?;
        tracing::info!(user_id = %user.id, "User signed up with code");
        Ok(user)
    }

    pub async fn begin_login_with_code(&self, email: &str) -> Result<(), CoordinationError> {
        let email = normalize_email(email)?;
        let user = self
            .credentials
            .get_user_by_email(&email)
            .await?
            .filter(|user| user.is_usable())
            .ok_or_else(|| CoordinationError::NotFound("User".to_string()).log())?;

        let pending = VerificationCode::new(
            user.email,
            CodePurpose::Login { user_id: user.id },
            self.config.verification_code_timeout,
        );
        let code = self.store_code(&pending).await?;

        self.deliver_code(&pending, &code, "Your login code").await?;
        tracing::debug!(email = %pending.email, "Login code sent");
        Ok(())
    }

    pub async fn finish_login_with_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<SessionGrant, CoordinationError> {
        let email = normalize_email(email)?;
        let pending = self.redeem_code(&self.login_codes, &email, code).await?;

        let CodePurpose::Login { user_id } = pending.purpose else {
            return Err(CoordinationError::InvalidRequest("Invalid code".to_string()).log());
        };

        match self.credentials.get_user(&user_id).await? {
            Some(user) if user.email == email && user.is_usable() => {}
            _ => return Err(CoordinationError::InvalidRequest("Invalid code".to_string()).log()),
        }

        self.issue_session(&user_id).await
    }

    fn code_store(&self, purpose: &CodePurpose) -> &SessionStore<VerificationCode> {
        match purpose {
            CodePurpose::Signup { .. } => &self.signup_codes,
            CodePurpose::Login { .. } => &self.login_codes,
        }
    }

    async fn store_code(&self, pending: &VerificationCode) -> Result<String, CoordinationError> {
        let store = self.code_store(&pending.purpose);
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = uuid::Uuid::new_v4().to_string();
            if store.create_with_key(&code, pending).await? {
                return Ok(code);
            }
        }
        Err(CoordinationError::Internal("Could not allocate a verification code".to_string()).log())
    }

    /// Sends the code, withdrawing it again if delivery fails.
    async fn deliver_code(
        &self,
        pending: &VerificationCode,
        code: &str,
        subject: &str,
    ) -> Result<(), CoordinationError> {
        let body = format!("{subject} is {code}");
        if let Err(err) = self.notifier.send(&pending.email, subject, &body).await {
            self.code_store(&pending.purpose).delete(code).await?;
            return Err(err.into());
        }
        Ok(())
    }

    /// Consumes the code. Absent, expired and mismatched codes all read as
    /// invalid so a caller cannot tell them apart.
    async fn redeem_code(
        &self,
        store: &SessionStore<VerificationCode>,
        email: &str,
        code: &str,
    ) -> Result<VerificationCode, CoordinationError> {
        let invalid = || CoordinationError::InvalidRequest("Invalid code".to_string()).log();

        let pending = store.consume(code).await?.ok_or_else(invalid)?;
        if pending.is_expired() || pending.email != email {
            return Err(invalid());
        }
        Ok(pending)
    }
}
