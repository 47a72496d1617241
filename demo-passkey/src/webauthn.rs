//! `WebAuthnProvider` backed by webauthn-rs
//!
//! The whole `Passkey` is serialized into the credential's key blob, so the
//! counter and backup flags webauthn-rs tracks survive a round trip through
//! the credential store.
//!
//! webauthn-rs enforces the signature counter itself: a login whose counter
//! does not advance fails `finish_passkey_authentication` with
//! `CredentialPossibleCompromise`. With this provider a cloned authenticator
//! therefore surfaces as `VerificationFailed`, and the store's `clone_warning`
//! flag is only raised by providers that hand back the raw counter.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;
use webauthn_rs::prelude::*;

use passkey_ceremony::{Challenge, User, VerifiedCredential, WebAuthnError, WebAuthnProvider};

use crate::config::{RP_ID, RP_NAME, RP_ORIGIN};

pub(crate) struct WebauthnRsProvider {
    webauthn: Webauthn,
}

impl WebauthnRsProvider {
    /// Relying party from `RP_ID`, `RP_ORIGIN` and `RP_NAME`.
    pub(crate) fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let origin = Url::parse(RP_ORIGIN.as_str())?;
        let webauthn = WebauthnBuilder::new(RP_ID.as_str(), &origin)?
            .rp_name(RP_NAME.as_str())
            .build()?;
        tracing::info!(rp_id = %RP_ID.as_str(), origin = %origin, "WebAuthn relying party configured");
        Ok(Self { webauthn })
    }
}

fn rejected(e: WebauthnError) -> WebAuthnError {
    WebAuthnError::Rejected(e.to_string())
}

fn internal(e: impl std::fmt::Display) -> WebAuthnError {
    WebAuthnError::Internal(e.to_string())
}

fn encode_id(id: &CredentialID) -> String {
    URL_SAFE_NO_PAD.encode(id)
}

fn user_uuid(user: &User) -> Result<Uuid, WebAuthnError> {
    Uuid::parse_str(&user.id).map_err(internal)
}

fn stored_passkeys(user: &User) -> Result<Vec<Passkey>, WebAuthnError> {
    user.credentials
        .iter()
        .map(|c| serde_json::from_slice::<Passkey>(&c.public_key).map_err(internal))
        .collect()
}

fn transports(response: &Value) -> Vec<String> {
    response["response"]["transports"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl WebAuthnProvider for WebauthnRsProvider {
    async fn begin_registration(&self, user: &User) -> Result<Challenge, WebAuthnError> {
        let exclude = stored_passkeys(user)?
            .iter()
            .map(|p| p.cred_id().clone())
            .collect::<Vec<_>>();

        let (options, state) = self
            .webauthn
            .start_passkey_registration(
                user_uuid(user)?,
                &user.name,
                &user.display_name,
                Some(exclude),
            )
            .map_err(internal)?;

        Ok(Challenge {
            options: serde_json::to_value(options).map_err(internal)?,
            pending_state: serde_json::to_string(&state).map_err(internal)?,
        })
    }

    async fn finish_registration(
        &self,
        _user: &User,
        pending_state: &str,
        response: &Value,
    ) -> Result<VerifiedCredential, WebAuthnError> {
        let state: PasskeyRegistration = serde_json::from_str(pending_state).map_err(internal)?;
        let credential: RegisterPublicKeyCredential = serde_json::from_value(response.clone())
            .map_err(|e| WebAuthnError::InvalidResponse(e.to_string()))?;

        let passkey = self
            .webauthn
            .finish_passkey_registration(&credential, &state)
            .map_err(rejected)?;

        Ok(VerifiedCredential {
            id: encode_id(passkey.cred_id()),
            public_key: serde_json::to_vec(&passkey).map_err(internal)?,
            sign_count: 0,
            transports: transports(response),
        })
    }

    async fn begin_login(&self, user: &User) -> Result<Challenge, WebAuthnError> {
        let passkeys = stored_passkeys(user)?;
        let (options, state) = self
            .webauthn
            .start_passkey_authentication(&passkeys)
            .map_err(internal)?;

        Ok(Challenge {
            options: serde_json::to_value(options).map_err(internal)?,
            pending_state: serde_json::to_string(&state).map_err(internal)?,
        })
    }

    async fn finish_login(
        &self,
        user: &User,
        pending_state: &str,
        response: &Value,
    ) -> Result<VerifiedCredential, WebAuthnError> {
        let state: PasskeyAuthentication = serde_json::from_str(pending_state).map_err(internal)?;
        let credential: PublicKeyCredential = serde_json::from_value(response.clone())
            .map_err(|e| WebAuthnError::InvalidResponse(e.to_string()))?;

        let result = self
            .webauthn
            .finish_passkey_authentication(&credential, &state)
            .map_err(rejected)?;

        let mut passkey = stored_passkeys(user)?
            .into_iter()
            .find(|p| p.cred_id() == result.cred_id())
            .ok_or_else(|| WebAuthnError::Rejected("Unknown credential".to_string()))?;
        passkey.update_credential(&result);

        Ok(VerifiedCredential {
            id: encode_id(result.cred_id()),
            public_key: serde_json::to_vec(&passkey).map_err(internal)?,
            sign_count: result.counter(),
            transports: Vec::new(),
        })
    }
}
