use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::userdb::User;

/// Output of a begin step: options for the browser and state to keep
/// server-side until the matching finish.
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub options: Value,
    pub pending_state: String,
}

/// A credential whose attestation or assertion checked out.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedCredential {
    /// Raw credential id, base64url
    pub id: String,
    pub public_key: Vec<u8>,
    pub sign_count: u32,
    pub transports: Vec<String>,
}

#[derive(Debug, Error, Clone)]
pub enum WebAuthnError {
    /// Signature, challenge or origin did not verify
    #[error("Verification failed: {0}")]
    Rejected(String),

    /// Client response could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("WebAuthn provider error: {0}")]
    Internal(String),
}

/// WebAuthn ceremony verification.
///
/// The `pending_state` produced by a begin call is stored untouched and
/// handed back to the matching finish call.
#[async_trait]
pub trait WebAuthnProvider: Send + Sync {
    /// `user.credentials` are the ones to exclude from re-registration.
    async fn begin_registration(&self, user: &User) -> Result<Challenge, WebAuthnError>;

    async fn finish_registration(
        &self,
        user: &User,
        pending_state: &str,
        response: &Value,
    ) -> Result<VerifiedCredential, WebAuthnError>;

    /// `user.credentials` are the ones the client may assert with.
    async fn begin_login(&self, user: &User) -> Result<Challenge, WebAuthnError>;

    async fn finish_login(
        &self,
        user: &User,
        pending_state: &str,
        response: &Value,
    ) -> Result<VerifiedCredential, WebAuthnError>;
}
