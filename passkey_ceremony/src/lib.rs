//! passkey-ceremony - passkey registration and login orchestration
//!
//! The crate issues single-use ceremony tokens, consumes them atomically when
//! a ceremony finishes, and keeps users and their credentials in a pluggable
//! store. Verifying WebAuthn messages and delivering mail are left to the
//! [`WebAuthnProvider`] and [`Notifier`] implementations supplied by the
//! caller.

mod config;
mod coordination;
mod provider;
mod session;
mod storage;
mod userdb;
mod utils;

#[cfg(test)]
mod test_utils;

pub use config::{CEREMONY_TIMEOUT, CeremonyConfig, SESSION_TIMEOUT, VERIFICATION_CODE_TIMEOUT};

pub use coordination::{
    CeremonyOrchestrator, CeremonyStart, CoordinationError, FinishCeremony, LoginOutcome,
    RegistrationOutcome, SessionGrant,
};

pub use provider::{
    Challenge, Notifier, NotifierError, TracingNotifier, VerifiedCredential, WebAuthnError,
    WebAuthnProvider,
};

pub use session::{
    AuthenticatedSession, CeremonyKind, CeremonySession, CodePurpose, SessionError,
    SessionStore, SessionValue, VerificationCode,
};

pub use storage::{
    CacheData, CacheStore, CacheStoreConfig, CacheStoreKind, ConcurrentCacheStore, DataStore,
    DataStoreConfig, DataStoreKind, InMemoryCacheStore, PostgresDataStore, RedisCacheStore,
    SharedCacheStore, SqlCacheStore, SqliteDataStore, StorageError, into_shared,
};

pub use userdb::{
    Credential, CredentialStore, CredentialUpdate, InMemoryCredentialStore, SqlCredentialStore,
    User, UserError, UserIdentity, counter_regressed, credential_store_for, normalize_email,
};

pub use utils::{UtilError, gen_random_string};
