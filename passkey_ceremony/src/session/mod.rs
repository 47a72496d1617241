mod errors;
mod store;
mod types;

pub use errors::SessionError;
pub use store::SessionStore;
pub use types::{
    AuthenticatedSession, CeremonyKind, CeremonySession, CodePurpose, SessionValue,
    VerificationCode,
};
