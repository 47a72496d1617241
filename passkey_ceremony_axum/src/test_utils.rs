//! Permissive fakes for handler tests
//!
//! The fake provider trusts whatever the "browser" sends: the response is
//! `{id, sign_count}` and nothing is verified beyond parsing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use passkey_ceremony::{
    CeremonyConfig, CeremonyOrchestrator, Challenge, ConcurrentCacheStore,
    InMemoryCredentialStore, Notifier, NotifierError, User, VerifiedCredential, WebAuthnError,
    WebAuthnProvider, into_shared,
};

struct FakeWebAuthn;

impl FakeWebAuthn {
    fn verify(response: &Value) -> Result<VerifiedCredential, WebAuthnError> {
        let id = response["id"]
            .as_str()
            .ok_or_else(|| WebAuthnError::InvalidResponse("missing id".to_string()))?;
        let sign_count = response["sign_count"].as_u64().unwrap_or(0) as u32;
        Ok(VerifiedCredential {
            id: id.to_string(),
            public_key: id.as_bytes().to_vec(),
            sign_count,
            transports: vec![],
        })
    }
}

#[async_trait]
impl WebAuthnProvider for FakeWebAuthn {
    async fn begin_registration(&self, user: &User) -> Result<Challenge, WebAuthnError> {
        Ok(Challenge {
            options: json!({"user": user.id}),
            pending_state: user.id.clone(),
        })
    }

    async fn finish_registration(
        &self,
        _user: &User,
        _pending_state: &str,
        response: &Value,
    ) -> Result<VerifiedCredential, WebAuthnError> {
        Self::verify(response)
    }

    async fn begin_login(&self, user: &User) -> Result<Challenge, WebAuthnError> {
        Ok(Challenge {
            options: json!({"allowCredentials": user.credential_ids()}),
            pending_state: user.id.clone(),
        })
    }

    async fn finish_login(
        &self,
        _user: &User,
        _pending_state: &str,
        response: &Value,
    ) -> Result<VerifiedCredential, WebAuthnError> {
        Self::verify(response)
    }
}

pub(crate) type Outbox = Arc<Mutex<Vec<String>>>;

struct OutboxNotifier(Outbox);

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, _recipient: &str, _subject: &str, body: &str) -> Result<(), NotifierError> {
        self.0.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

pub(crate) fn fake_response(credential_id: &str, sign_count: u32) -> Value {
    json!({"id": credential_id, "sign_count": sign_count})
}

/// Code at the end of the most recent message
pub(crate) fn last_code(outbox: &Outbox) -> String {
    let messages = outbox.lock().unwrap();
    let body = messages.last().expect("no message sent");
    body.rsplit(' ').next().unwrap_or_default().to_string()
}

pub(crate) fn test_orchestrator_with_outbox() -> (Arc<CeremonyOrchestrator>, Outbox) {
    let outbox = Outbox::default();
    let orchestrator = CeremonyOrchestrator::new(
        Arc::new(InMemoryCredentialStore::new()),
        into_shared(ConcurrentCacheStore::new()),
        Arc::new(FakeWebAuthn),
        Arc::new(OutboxNotifier(outbox.clone())),
        CeremonyConfig::default(),
    );
    (Arc::new(orchestrator), outbox)
}

pub(crate) fn test_orchestrator() -> Arc<CeremonyOrchestrator> {
    test_orchestrator_with_outbox().0
}
