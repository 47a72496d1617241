use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{Router, delete, get, post},
};
use axum_extra::{TypedHeader, headers::UserAgent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use passkey_ceremony::{
    CeremonyOrchestrator, CeremonyStart, FinishCeremony, LoginOutcome, RegistrationOutcome, User,
    UserIdentity,
};

use crate::IntoResponseError;
use crate::config::CEREMONY_TOKEN_HEADER;
use crate::session::{
    AuthSession, SessionToken, clear_session_cookie, session_headers, single_header,
};

type AppState = Arc<CeremonyOrchestrator>;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .nest("/register", router_register())
        .nest("/login", router_login())
        .route("/logout", post(handle_logout))
        .route("/me", get(handle_me))
        .route("/credentials", get(list_credential_labels))
        .route("/credentials/{credential_id}", delete(delete_credential))
}

fn router_register() -> Router<AppState> {
    Router::new()
        .route("/start", post(handle_start_registration))
        .route("/finish", post(handle_finish_registration))
}

fn router_login() -> Router<AppState> {
    Router::new()
        .route("/start", post(handle_start_login))
        .route("/finish", post(handle_finish_login))
}

/// Body of the finish endpoints. `response` is the authenticator output
/// exactly as the browser produced it.
#[derive(Debug, Deserialize)]
pub(crate) struct FinishRequest {
    #[serde(default)]
    pub(crate) email: Option<String>,
    #[serde(default)]
    pub(crate) label: Option<String>,
    pub(crate) response: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EmailRequest {
    pub(crate) email: String,
}

/// Profile returned by `/me`. Key material stays server-side.
#[derive(Debug, Serialize)]
pub(crate) struct UserProfile {
    pub(crate) id: String,
    pub(crate) email: String,
    pub(crate) name: String,
    pub(crate) display_name: String,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) credentials: Vec<CredentialSummary>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CredentialSummary {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) clone_warning: bool,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) last_used_at: Option<DateTime<Utc>>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            display_name: user.display_name,
            created_at: user.created_at,
            credentials: user
                .credentials
                .into_iter()
                .map(|c| CredentialSummary {
                    id: c.id,
                    label: c.label,
                    clone_warning: c.clone_warning,
                    created_at: c.created_at,
                    last_used_at: c.last_used_at,
                })
                .collect(),
        }
    }
}

fn ceremony_token(headers: &HeaderMap) -> Result<String, (StatusCode, String)> {
    headers
        .get(CEREMONY_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| {
            tracing::debug!("Missing {} header", CEREMONY_TOKEN_HEADER);
            (
                StatusCode::BAD_REQUEST,
                format!("Missing {CEREMONY_TOKEN_HEADER} header"),
            )
        })
}

/// Label from the body, else the user agent.
pub(crate) fn finish_ceremony(
    headers: &HeaderMap,
    user_agent: Option<TypedHeader<UserAgent>>,
    body: FinishRequest,
) -> Result<FinishCeremony, (StatusCode, String)> {
    let label = body
        .label
        .or_else(|| user_agent.map(|TypedHeader(agent)| agent.as_str().to_string()));

    Ok(FinishCeremony {
        token: ceremony_token(headers)?,
        claimed_email: body.email,
        label,
        response: body.response,
    })
}

fn ceremony_start_response(
    start: CeremonyStart,
) -> Result<(HeaderMap, Json<CeremonyStart>), (StatusCode, String)> {
    let headers = single_header(CEREMONY_TOKEN_HEADER, &start.token)?;
    Ok((headers, Json(start)))
}

pub(crate) async fn handle_start_registration(
    State(orchestrator): State<AppState>,
    Json(identity): Json<UserIdentity>,
) -> Result<(HeaderMap, Json<CeremonyStart>), (StatusCode, String)> {
    let start = orchestrator
        .begin_registration(identity)
        .await
        .into_response_error()?;
    ceremony_start_response(start)
}

pub(crate) async fn handle_finish_registration(
    State(orchestrator): State<AppState>,
    headers: HeaderMap,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(body): Json<FinishRequest>,
) -> Result<(StatusCode, Json<RegistrationOutcome>), (StatusCode, String)> {
    let request = finish_ceremony(&headers, user_agent, body)?;
    let outcome = orchestrator
        .finish_registration(request)
        .await
        .into_response_error()?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub(crate) async fn handle_start_login(
    State(orchestrator): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<(HeaderMap, Json<CeremonyStart>), (StatusCode, String)> {
    let start = orchestrator
        .begin_login(&body.email)
        .await
        .into_response_error()?;
    ceremony_start_response(start)
}

pub(crate) async fn handle_finish_login(
    State(orchestrator): State<AppState>,
    headers: HeaderMap,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(body): Json<FinishRequest>,
) -> Result<(HeaderMap, Json<LoginOutcome>), (StatusCode, String)> {
    let request = finish_ceremony(&headers, user_agent, body)?;
    let outcome = orchestrator
        .finish_login(request)
        .await
        .into_response_error()?;
    Ok((session_headers(&outcome.session)?, Json(outcome)))
}

pub(crate) async fn handle_logout(
    State(orchestrator): State<AppState>,
    SessionToken(token): SessionToken,
) -> Result<(StatusCode, HeaderMap), (StatusCode, String)> {
    if let Some(token) = token {
        orchestrator.logout(&token).await.into_response_error()?;
    }
    let headers = single_header("set-cookie", &clear_session_cookie())?;
    Ok((StatusCode::NO_CONTENT, headers))
}

pub(crate) async fn handle_me(
    State(orchestrator): State<AppState>,
    session: AuthSession,
) -> Result<Json<UserProfile>, (StatusCode, String)> {
    let user = orchestrator
        .current_user(&session.token)
        .await
        .into_response_error()?;
    Ok(Json(user.into()))
}

pub(crate) async fn list_credential_labels(
    State(orchestrator): State<AppState>,
    Query(query): Query<EmailRequest>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let labels = orchestrator
        .list_credential_labels(&query.email)
        .await
        .into_response_error()?;
    Ok(Json(labels))
}

pub(crate) async fn delete_credential(
    State(orchestrator): State<AppState>,
    session: AuthSession,
    Path(credential_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    orchestrator
        .remove_credential(&session.token, &credential_id)
        .await
        .into_response_error()?;
    Ok(StatusCode::NO_CONTENT)
}
