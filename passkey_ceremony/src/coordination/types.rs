use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Returned by the begin operations.
#[derive(Debug, Clone, Serialize)]
pub struct CeremonyStart {
    /// Single-use token the client must present to finish
    pub token: String,
    /// Options to hand to `navigator.credentials`
    pub options: Value,
    pub expires_at: DateTime<Utc>,
}

/// Client half of a finish operation.
#[derive(Debug, Clone)]
pub struct FinishCeremony {
    pub token: String,
    /// Checked against the user the ceremony was begun for
    pub claimed_email: Option<String>,
    /// Label stored with the credential, e.g. the user agent
    pub label: Option<String>,
    pub response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationOutcome {
    pub user_id: String,
    pub credential_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionGrant {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginOutcome {
    #[serde(flatten)]
    pub session: SessionGrant,
    /// The authenticator's counter did not advance
    pub clone_warning: bool,
}
