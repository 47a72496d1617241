//! Combined router for all ceremony endpoints

use std::sync::Arc;

use axum::Router;

use passkey_ceremony::CeremonyOrchestrator;

/// Create a router for every ceremony, session and code endpoint
///
/// Mount it wherever the application wants the endpoints, e.g.
/// `Router::new().nest("/auth", passkey_ceremony_router(orchestrator))`.
pub fn passkey_ceremony_router(orchestrator: Arc<CeremonyOrchestrator>) -> Router {
    Router::new()
        .merge(super::passkey::router())
        .nest("/signup", super::code::router_signup())
        .nest("/login-with-code", super::code::router_login_with_code())
        .with_state(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_orchestrator;

    #[test]
    fn test_router_builds() {
        // Overlapping or malformed routes panic at construction
        let _router = passkey_ceremony_router(test_orchestrator());
    }
}
