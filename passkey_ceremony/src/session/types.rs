use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// A value that can be kept in a [`SessionStore`](super::SessionStore).
pub trait SessionValue: Serialize + DeserializeOwned + Send + Sync {
    /// Owner recorded next to the payload, if any.
    fn user_id(&self) -> Option<&str> {
        None
    }

    fn expires_at(&self) -> DateTime<Utc>;

    fn is_expired(&self) -> bool {
        self.expires_at() <= Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyKind {
    Registration,
    Login,
}

impl std::fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Login => write!(f, "login"),
        }
    }
}

/// In-flight registration or login, bound to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CeremonySession {
    pub kind: CeremonyKind,
    pub user_id: String,
    /// Opaque state produced by the WebAuthn provider at begin time.
    pub pending_state: String,
    pub expires_at: DateTime<Utc>,
}

impl CeremonySession {
    pub fn new(kind: CeremonyKind, user_id: String, pending_state: String, ttl: Duration) -> Self {
        Self {
            kind,
            user_id,
            pending_state,
            expires_at: Utc::now() + ttl,
        }
    }
}

impl SessionValue for CeremonySession {
    fn user_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedSession {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthenticatedSession {
    pub fn new(user_id: String, ttl: Duration) -> Self {
        let created_at = Utc::now();
        Self {
            user_id,
            created_at,
            expires_at: created_at + ttl,
        }
    }
}

impl SessionValue for AuthenticatedSession {
    fn user_id(&self) -> Option<&str> {
        Some(&self.user_id)
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum CodePurpose {
    Signup { name: String, display_name: String },
    Login { user_id: String },
}

/// Pending code-based signup or login, keyed by the code that was sent out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationCode {
    pub email: String,
    #[serde(flatten)]
    pub purpose: CodePurpose,
    pub expires_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn new(email: String, purpose: CodePurpose, ttl: Duration) -> Self {
        Self {
            email,
            purpose,
            expires_at: Utc::now() + ttl,
        }
    }
}

impl SessionValue for VerificationCode {
    fn user_id(&self) -> Option<&str> {
        match &self.purpose {
            CodePurpose::Login { user_id } => Some(user_id),
            CodePurpose::Signup { .. } => None,
        }
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceremony_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&CeremonyKind::Registration).unwrap(),
            "\"registration\""
        );
        assert_eq!(CeremonyKind::Login.to_string(), "login");
    }

    #[test]
    fn test_verification_code_flattens_purpose() {
        // Given a signup code
        let code = VerificationCode::new(
            "a@example.com".to_string(),
            CodePurpose::Signup {
                name: "alice".to_string(),
                display_name: "Alice".to_string(),
            },
            Duration::minutes(10),
        );

        // When serializing
        let json = serde_json::to_value(&code).unwrap();

        // Then the purpose tag sits next to the email
        assert_eq!(json["purpose"], "signup");
        assert_eq!(json["email"], "a@example.com");
        assert_eq!(json["display_name"], "Alice");

        // And it round-trips
        let back: VerificationCode = serde_json::from_value(json).unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn test_user_binding() {
        let login = VerificationCode::new(
            "a@example.com".to_string(),
            CodePurpose::Login {
                user_id: "u1".to_string(),
            },
            Duration::minutes(10),
        );
        assert_eq!(login.user_id(), Some("u1"));

        let session = AuthenticatedSession::new("u2".to_string(), Duration::hours(1));
        assert_eq!(SessionValue::user_id(&session), Some("u2"));
        assert!(!session.is_expired());
    }

    #[test]
    fn test_expired_session() {
        let session = AuthenticatedSession::new("u".to_string(), Duration::seconds(-1));
        assert!(session.is_expired());
    }
}
