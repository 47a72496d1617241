use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{Router, post},
};
use serde::Deserialize;

use passkey_ceremony::{CeremonyOrchestrator, SessionGrant, UserIdentity};

use crate::IntoResponseError;
use crate::passkey::{EmailRequest, UserProfile};
use crate::session::session_headers;

type AppState = Arc<CeremonyOrchestrator>;

pub(crate) fn router_signup() -> Router<AppState> {
    Router::new()
        .route("/start", post(handle_start_signup))
        .route("/finish", post(handle_finish_signup))
}

pub(crate) fn router_login_with_code() -> Router<AppState> {
    Router::new()
        .route("/start", post(handle_start_login_with_code))
        .route("/finish", post(handle_finish_login_with_code))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CodeRequest {
    pub(crate) email: String,
    pub(crate) code: String,
}

pub(crate) async fn handle_start_signup(
    State(orchestrator): State<AppState>,
    Json(identity): Json<UserIdentity>,
) -> Result<StatusCode, (StatusCode, String)> {
    orchestrator
        .begin_signup_with_code(identity)
        .await
        .into_response_error()?;
    Ok(StatusCode::ACCEPTED)
}

pub(crate) async fn handle_finish_signup(
    State(orchestrator): State<AppState>,
    Json(body): Json<CodeRequest>,
) -> Result<(StatusCode, Json<UserProfile>), (StatusCode, String)> {
    let user = orchestrator
        .finish_signup_with_code(&body.email, &body.code)
        .await
        .into_response_error()?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub(crate) async fn handle_start_login_with_code(
    State(orchestrator): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    orchestrator
        .begin_login_with_code(&body.email)
        .await
        .into_response_error()?;
    Ok(StatusCode::ACCEPTED)
}

pub(crate) async fn handle_finish_login_with_code(
    State(orchestrator): State<AppState>,
    Json(body): Json<CodeRequest>,
) -> Result<(HeaderMap, Json<SessionGrant>), (StatusCode, String)> {
    let grant = orchestrator
        .finish_login_with_code(&body.email, &body.code)
        .await
        .into_response_error()?;
    Ok((session_headers(&grant)?, Json(grant)))
}
