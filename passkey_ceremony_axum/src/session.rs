use std::sync::Arc;

use axum::{
    RequestPartsExt,
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
};
use axum_extra::{TypedHeader, headers};
use chrono::{DateTime, Utc};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header::SET_COOKIE, request::Parts};

use passkey_ceremony::{CeremonyOrchestrator, SessionGrant};

use crate::IntoResponseError;
use crate::config::{SESSION_COOKIE_NAME, SESSION_TOKEN_HEADER};

/// Session token presented with a request, if any.
///
/// The `x-session-token` header wins over the session cookie.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionToken(pub Option<String>);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        if let Some(token) = parts
            .headers
            .get(SESSION_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
        {
            return Ok(Self(Some(token.to_string())));
        }

        let cookies: Option<TypedHeader<headers::Cookie>> = parts.extract().await.ok();
        let token = cookies
            .as_ref()
            .and_then(|cookies| cookies.get(SESSION_COOKIE_NAME.as_str()))
            .map(str::to_string);
        Ok(Self(token))
    }
}

/// An authorized session, available as an Axum extractor
///
/// Rejects with 401 when no live session token accompanies the request.
///
/// ```no_run
/// use passkey_ceremony_axum::AuthSession;
///
/// async fn whoami(session: AuthSession) -> String {
///     session.user_id
/// }
/// ```
#[derive(Clone, Debug)]
pub struct AuthSession {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<S> FromRequestParts<S> for AuthSession
where
    Arc<CeremonyOrchestrator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let orchestrator = Arc::<CeremonyOrchestrator>::from_ref(state);
        let SessionToken(token) = SessionToken::from_request_parts(parts, state).await?;

        let Some(token) = token else {
            tracing::debug!("No session token presented");
            return Err((StatusCode::UNAUTHORIZED, "Unauthorized".to_string()));
        };

        let session = orchestrator.authorize(&token).await.into_response_error()?;
        Ok(Self {
            token,
            user_id: session.user_id,
            created_at: session.created_at,
            expires_at: session.expires_at,
        })
    }
}

impl<S> OptionalFromRequestParts<S> for AuthSession
where
    Arc<CeremonyOrchestrator>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let result: Result<Self, Self::Rejection> =
            <AuthSession as FromRequestParts<S>>::from_request_parts(parts, state).await;
        Ok(result.ok())
    }
}

fn header_value(value: &str) -> Result<HeaderValue, (StatusCode, String)> {
    HeaderValue::from_str(value).map_err(|e| {
        tracing::error!("Invalid header value: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    })
}

pub(crate) fn session_cookie(grant: &SessionGrant) -> String {
    let max_age = (grant.expires_at - Utc::now()).num_seconds().max(0);
    format!(
        "{}={}; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age={max_age}",
        SESSION_COOKIE_NAME.as_str(),
        grant.token
    )
}

pub(crate) fn clear_session_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE_NAME.as_str()
    )
}

/// Headers handing a fresh session to the client.
pub(crate) fn session_headers(grant: &SessionGrant) -> Result<HeaderMap, (StatusCode, String)> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(SESSION_TOKEN_HEADER),
        header_value(&grant.token)?,
    );
    headers.insert(SET_COOKIE, header_value(&session_cookie(grant))?);
    Ok(headers)
}

pub(crate) fn single_header(
    name: &'static str,
    value: &str,
) -> Result<HeaderMap, (StatusCode, String)> {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(name), header_value(value)?);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_orchestrator;
    use chrono::Duration;
    use http::Request;

    fn parts_with(header: Option<(&str, &str)>) -> Parts {
        let mut builder = Request::builder().uri("/me");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn grant(token: &str) -> SessionGrant {
        SessionGrant {
            token: token.to_string(),
            user_id: "user".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn test_session_token_prefers_header() {
        // Given both a header and a cookie
        let cookie = format!("{}=from-cookie", SESSION_COOKIE_NAME.as_str());
        let mut parts = parts_with(Some(("cookie", &cookie)));
        parts
            .headers
            .insert(SESSION_TOKEN_HEADER, HeaderValue::from_static("from-header"));

        // When extracting the token
        let token = SessionToken::from_request_parts(&mut parts, &()).await.unwrap();

        // Then the header is used
        assert_eq!(token, SessionToken(Some("from-header".to_string())));
    }

    #[tokio::test]
    async fn test_session_token_from_cookie() {
        let cookie = format!("other=1; {}=from-cookie", SESSION_COOKIE_NAME.as_str());
        let mut parts = parts_with(Some(("cookie", &cookie)));

        let token = SessionToken::from_request_parts(&mut parts, &()).await.unwrap();

        assert_eq!(token.0.as_deref(), Some("from-cookie"));
    }

    #[tokio::test]
    async fn test_session_token_absent() {
        let mut parts = parts_with(None);
        let token = SessionToken::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(token, SessionToken(None));
    }

    #[tokio::test]
    async fn test_auth_session_rejects_unknown_token() {
        // Given a request with a token that was never issued
        let state = test_orchestrator();
        let mut parts = parts_with(Some((SESSION_TOKEN_HEADER, "bogus")));

        // When extracting an AuthSession
        let result =
            <AuthSession as FromRequestParts<_>>::from_request_parts(&mut parts, &state).await;

        // Then the request is unauthorized
        assert_eq!(result.unwrap_err().0, StatusCode::UNAUTHORIZED);

        // And the optional form yields None
        let mut parts = parts_with(None);
        let optional =
            <AuthSession as OptionalFromRequestParts<_>>::from_request_parts(&mut parts, &state)
                .await
                .unwrap();
        assert!(optional.is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&grant("tok"));
        assert!(cookie.starts_with(&format!("{}=tok;", SESSION_COOKIE_NAME.as_str())));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3"));

        assert!(clear_session_cookie().ends_with("Max-Age=0"));
    }

    #[test]
    fn test_session_headers() {
        let headers = session_headers(&grant("tok")).unwrap();
        assert_eq!(headers.get(SESSION_TOKEN_HEADER).unwrap(), "tok");
        assert!(headers.get(SET_COOKIE).is_some());
    }
}
