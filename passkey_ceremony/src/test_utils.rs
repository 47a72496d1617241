//! Test doubles for the external capabilities and ready-made orchestrators
//!
//! `MockWebAuthn` keeps the browser side trivial: a "response" is a JSON
//! object echoing the challenge plus the credential fields the provider
//! would normally extract from an attestation or assertion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::CeremonyConfig;
use crate::coordination::CeremonyOrchestrator;
use crate::provider::{
    Challenge, Notifier, NotifierError, VerifiedCredential, WebAuthnError, WebAuthnProvider,
};
use crate::storage::{
    CacheStore, ConcurrentCacheStore, SqlCacheStore, connect_sqlite_memory, into_shared,
};
use crate::userdb::{InMemoryCredentialStore, User, credential_store_for};
use crate::utils::gen_random_string;

#[derive(Serialize, Deserialize)]
struct Pending {
    challenge: String,
    user_id: String,
}

#[derive(Deserialize)]
struct MockResponse {
    challenge: String,
    id: String,
    public_key: Vec<u8>,
    sign_count: u32,
    #[serde(default)]
    transports: Vec<String>,
}

#[derive(Debug, Default)]
pub(crate) struct MockWebAuthn;

impl MockWebAuthn {
    pub(crate) fn pending_state(challenge: &str, user_id: &str) -> String {
        json!({"challenge": challenge, "user_id": user_id}).to_string()
    }

    pub(crate) fn registration_response(options: &Value, credential_id: &str) -> Value {
        json!({
            "challenge": options["challenge"],
            "id": credential_id,
            "public_key": credential_id.as_bytes(),
            "sign_count": 0,
            "transports": ["internal"],
        })
    }

    pub(crate) fn login_response(options: &Value, credential_id: &str, sign_count: u32) -> Value {
        json!({
            "challenge": options["challenge"],
            "id": credential_id,
            "public_key": credential_id.as_bytes(),
            "sign_count": sign_count,
        })
    }

    fn challenge(user: &User) -> Result<(String, String), WebAuthnError> {
        let challenge =
            gen_random_string(16).map_err(|e| WebAuthnError::Internal(e.to_string()))?;
        let pending = Self::pending_state(&challenge, &user.id);
        Ok((challenge, pending))
    }

    fn verify(
        user: &User,
        pending_state: &str,
        response: &Value,
    ) -> Result<VerifiedCredential, WebAuthnError> {
        let pending: Pending = serde_json::from_str(pending_state)
            .map_err(|e| WebAuthnError::Internal(e.to_string()))?;
        let response: MockResponse = serde_json::from_value(response.clone())
            .map_err(|e| WebAuthnError::InvalidResponse(e.to_string()))?;

        if pending.user_id != user.id {
            return Err(WebAuthnError::Rejected("User handle mismatch".to_string()));
        }
        if pending.challenge != response.challenge {
            return Err(WebAuthnError::Rejected("Challenge mismatch".to_string()));
        }

        Ok(VerifiedCredential {
            id: response.id,
            public_key: response.public_key,
            sign_count: response.sign_count,
            transports: response.transports,
        })
    }
}

#[async_trait]
impl WebAuthnProvider for MockWebAuthn {
    async fn begin_registration(&self, user: &User) -> Result<Challenge, WebAuthnError> {
        let (challenge, pending_state) = Self::challenge(user)?;
        Ok(Challenge {
            options: json!({
                "challenge": challenge,
                "user": {"id": user.id, "name": user.name, "displayName": user.display_name},
                "excludeCredentials": user.credential_ids(),
            }),
            pending_state,
        })
    }

    async fn finish_registration(
        &self,
        user: &User,
        pending_state: &str,
        response: &Value,
    ) -> Result<VerifiedCredential, WebAuthnError> {
        Self::verify(user, pending_state, response)
    }

    async fn begin_login(&self, user: &User) -> Result<Challenge, WebAuthnError> {
        let (challenge, pending_state) = Self::challenge(user)?;
        Ok(Challenge {
            options: json!({
                "challenge": challenge,
                "allowCredentials": user.credential_ids(),
            }),
            pending_state,
        })
    }

    async fn finish_login(
        &self,
        user: &User,
        pending_state: &str,
        response: &Value,
    ) -> Result<VerifiedCredential, WebAuthnError> {
        Self::verify(user, pending_state, response)
    }
}

/// Keeps every message, delivered or not.
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub(crate) fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    /// Recipient and code of the most recent message
    pub(crate) fn last_code(&self) -> Option<(String, String)> {
        let sent = self.sent.lock().unwrap();
        let (recipient, body) = sent.last()?;
        let code = body.rsplit(' ').next()?;
        Some((recipient.clone(), code.to_string()))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, _subject: &str, body: &str) -> Result<(), NotifierError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), body.to_string()));

        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(NotifierError::Delivery("mailbox unavailable".to_string()));
        }
        Ok(())
    }
}

/// Orchestrator over in-memory stores with default lifetimes.
pub(crate) fn memory_orchestrator() -> (CeremonyOrchestrator, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = CeremonyOrchestrator::new(
        Arc::new(InMemoryCredentialStore::new()),
        into_shared(ConcurrentCacheStore::new()),
        Arc::new(MockWebAuthn),
        notifier.clone(),
        CeremonyConfig::default(),
    );
    (orchestrator, notifier)
}

/// Orchestrator whose users, credentials and sessions all live in one
/// in-memory SQLite database.
pub(crate) async fn sql_orchestrator() -> (CeremonyOrchestrator, Arc<RecordingNotifier>) {
    let data_store = connect_sqlite_memory().await;
    let credentials = credential_store_for(Some(data_store.clone()))
        .await
        .expect("Failed to initialize credential store");
    let cache = SqlCacheStore::new(data_store);
    cache.init().await.expect("Failed to initialize session table");

    let notifier = Arc::new(RecordingNotifier::default());
    let orchestrator = CeremonyOrchestrator::new(
        credentials,
        into_shared(cache),
        Arc::new(MockWebAuthn),
        notifier.clone(),
        CeremonyConfig::default(),
    );
    (orchestrator, notifier)
}
