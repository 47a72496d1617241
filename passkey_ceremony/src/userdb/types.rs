use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::UserError;
use crate::utils::serde_base64url;

/// Who a ceremony is for, as supplied by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

impl UserIdentity {
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            display_name: display_name.into(),
        }
    }

    /// Lower-cases and trims the email, and fills in missing names from it.
    pub fn normalized(self) -> Result<Self, UserError> {
        let email = normalize_email(&self.email)?;

        let name = match self.name.trim() {
            "" => email.clone(),
            name => name.to_string(),
        };
        let display_name = match self.display_name.trim() {
            "" => name.clone(),
            display_name => display_name.to_string(),
        };

        Ok(Self {
            email,
            name,
            display_name,
        })
    }
}

pub fn normalize_email(email: &str) -> Result<String, UserError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(UserError::InvalidData(format!("Invalid email: {email}"))),
    }
}

/// Registered user. Never physically deleted; see `is_deleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub display_name: String,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Ordered by creation time
    #[serde(default)]
    pub credentials: Vec<Credential>,
}

impl User {
    /// Create a new user with a fresh random id
    pub fn new(identity: &UserIdentity) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            display_name: identity.display_name.clone(),
            is_active: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
            credentials: Vec::new(),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    pub fn credential(&self, credential_id: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.id == credential_id)
    }

    pub fn credential_ids(&self) -> Vec<String> {
        self.credentials.iter().map(|c| c.id.clone()).collect()
    }
}

/// One authenticator registered to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Raw credential id, base64url
    pub id: String,
    pub user_id: String,
    /// Opaque to this crate, interpreted only by the WebAuthn provider
    #[serde(with = "serde_base64url")]
    pub public_key: Vec<u8>,
    pub sign_count: u32,
    pub clone_warning: bool,
    #[serde(default)]
    pub transports: Vec<String>,
    #[serde(default)]
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(
        id: String,
        user_id: String,
        public_key: Vec<u8>,
        sign_count: u32,
        transports: Vec<String>,
        label: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            public_key,
            sign_count,
            clone_warning: false,
            transports,
            label,
            created_at: now,
            updated_at: now,
            last_used_at: None,
        }
    }
}

/// Result of [`CredentialStore::update_credential`](super::CredentialStore::update_credential).
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialUpdate {
    /// The credential as stored after the update
    pub credential: Credential,
    /// Set when the incoming counter did not advance and the credential was flagged
    pub clone_warning_raised: bool,
}

/// Whether `incoming` fails to advance past `stored`.
///
/// Authenticators without counter support report 0 forever, so 0 after 0 is
/// accepted.
pub fn counter_regressed(stored: u32, incoming: u32) -> bool {
    !(incoming > stored || (stored == 0 && incoming == 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identity_normalized_fills_names() {
        // Given an identity with only an email in mixed case
        let identity = UserIdentity::new("  Alice@Example.COM ", "", "");

        // When normalizing
        let identity = identity.normalized().unwrap();

        // Then the email is canonical and names default to it
        assert_eq!(identity.email, "alice@example.com");
        assert_eq!(identity.name, "alice@example.com");
        assert_eq!(identity.display_name, "alice@example.com");
    }

    #[test]
    fn test_identity_normalized_keeps_names() {
        let identity = UserIdentity::new("a@b.c", "alice", "Alice A.")
            .normalized()
            .unwrap();
        assert_eq!(identity.name, "alice");
        assert_eq!(identity.display_name, "Alice A.");
    }

    #[test]
    fn test_identity_rejects_bad_email() {
        for email in ["", "no-at-sign", "@example.com", "alice@"] {
            assert!(matches!(
                UserIdentity::new(email, "", "").normalized(),
                Err(UserError::InvalidData(_))
            ));
        }
    }

    #[test]
    fn test_user_new() {
        // Given a normalized identity
        let identity = UserIdentity::new("a@b.c", "a", "A");

        // When creating a user
        let user = User::new(&identity);

        // Then it is active with a UUID id and no credentials
        assert!(uuid::Uuid::parse_str(&user.id).is_ok());
        assert!(user.is_usable());
        assert!(user.credentials.is_empty());
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_credential_serializes_key_as_base64url() {
        let credential = Credential::new(
            "cred-1".to_string(),
            "user-1".to_string(),
            vec![0xfb, 0xff],
            0,
            vec!["usb".to_string()],
            "laptop".to_string(),
        );

        let json = serde_json::to_value(&credential).unwrap();
        assert_eq!(json["public_key"], "-_8");

        let back: Credential = serde_json::from_value(json).unwrap();
        assert_eq!(back.public_key, vec![0xfb, 0xff]);
    }

    #[test]
    fn test_counter_regressed_cases() {
        assert!(!counter_regressed(0, 0));
        assert!(!counter_regressed(0, 1));
        assert!(!counter_regressed(5, 6));
        assert!(counter_regressed(5, 5));
        assert!(counter_regressed(5, 4));
        assert!(counter_regressed(5, 0));
    }

    proptest! {
        #[test]
        fn prop_counter_advances_iff_greater(stored in 1u32.., incoming: u32) {
            prop_assert_eq!(counter_regressed(stored, incoming), incoming <= stored);
        }
    }
}
