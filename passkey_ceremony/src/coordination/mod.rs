//! Registration, login and code-based flows over the stores

mod code;
mod errors;
mod orchestrator;
mod passkey;
mod types;

pub use errors::CoordinationError;
pub use orchestrator::CeremonyOrchestrator;
pub use types::{CeremonyStart, FinishCeremony, LoginOutcome, RegistrationOutcome, SessionGrant};
