//! passkey-ceremony-axum - HTTP endpoints for passkey-ceremony
//!
//! Every endpoint is a thin handler over [`CeremonyOrchestrator`]. Errors map
//! to status codes through [`IntoResponseError`].

mod code;
mod config;
mod error;
mod passkey;
mod router;
mod session;

#[cfg(test)]
mod test_utils;

pub use config::{CEREMONY_TOKEN_HEADER, SESSION_COOKIE_NAME, SESSION_TOKEN_HEADER};
pub use error::IntoResponseError;
pub use router::passkey_ceremony_router;
pub use session::{AuthSession, SessionToken};

pub use passkey_ceremony::CeremonyOrchestrator;
