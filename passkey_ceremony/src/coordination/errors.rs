//! Error types for ceremony coordination

use thiserror::Error;

use crate::provider::{NotifierError, WebAuthnError};
use crate::session::SessionError;
use crate::userdb::UserError;
use crate::utils::UtilError;

/// Errors surfaced by [`CeremonyOrchestrator`](super::CeremonyOrchestrator)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinationError {
    /// Malformed input, a mismatched identity or an unusable code
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Expired: {0}")]
    Expired(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// The WebAuthn provider rejected the client response
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Unauthorized access")]
    Unauthorized,

    /// Backend or provider failure. Details are logged, never returned.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinationError {
    /// Log the error and return self
    ///
    /// Client-side failures go to `warn`, server-side ones to `error`.
    pub fn log(self) -> Self {
        match &self {
            Self::Internal(msg) => tracing::error!("Internal error: {}", msg),
            Self::VerificationFailed(msg) => tracing::warn!("Verification failed: {}", msg),
            other => tracing::warn!("{}", other),
        }
        self
    }
}

// Custom From implementations that automatically log errors

impl From<UserError> for CoordinationError {
    fn from(err: UserError) -> Self {
        let error = match err {
            UserError::NotFound => Self::NotFound("User".to_string()),
            UserError::Conflict(msg) => Self::Conflict(msg),
            UserError::InvalidData(msg) => Self::InvalidRequest(msg),
            UserError::Storage(msg) => Self::Internal(format!("User store: {msg}")),
        };
        error.log()
    }
}

impl From<SessionError> for CoordinationError {
    fn from(err: SessionError) -> Self {
        let error = Self::Internal(format!("Session store: {err}"));
        tracing::error!("{}", error);
        error
    }
}

impl From<WebAuthnError> for CoordinationError {
    fn from(err: WebAuthnError) -> Self {
        let error = match err {
            WebAuthnError::Rejected(msg) | WebAuthnError::InvalidResponse(msg) => {
                Self::VerificationFailed(msg)
            }
            WebAuthnError::Internal(msg) => Self::Internal(format!("WebAuthn provider: {msg}")),
        };
        error.log()
    }
}

impl From<NotifierError> for CoordinationError {
    fn from(err: NotifierError) -> Self {
        let error = Self::Internal(format!("Notifier: {err}"));
        tracing::error!("{}", error);
        error
    }
}

impl From<UtilError> for CoordinationError {
    fn from(err: UtilError) -> Self {
        let error = Self::Internal(format!("Utils: {err}"));
        tracing::error!("{}", error);
        error
    }
}
