//! Capabilities the orchestrator relies on but does not implement

mod notifier;
mod webauthn;

pub use notifier::{Notifier, NotifierError, TracingNotifier};
pub use webauthn::{Challenge, VerifiedCredential, WebAuthnError, WebAuthnProvider};
