use http::StatusCode;
use passkey_ceremony::CoordinationError;

/// Helper trait for converting errors to a standard response error format
pub trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)>;
}

pub(crate) fn status_for(error: &CoordinationError) -> StatusCode {
    match error {
        CoordinationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        CoordinationError::NotFound(_) => StatusCode::NOT_FOUND,
        CoordinationError::Expired(_) => StatusCode::GONE,
        CoordinationError::Conflict(_) => StatusCode::CONFLICT,
        CoordinationError::VerificationFailed(_) => StatusCode::UNAUTHORIZED,
        CoordinationError::Unauthorized => StatusCode::UNAUTHORIZED,
        CoordinationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Internal details stay in the log; clients get a generic message.
impl<T> IntoResponseError<T> for Result<T, CoordinationError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(|e| {
            let status = status_for(&e);
            let message = match e {
                CoordinationError::Internal(_) => "Internal server error".to_string(),
                other => other.to_string(),
            };
            (status, message)
        })
    }
}
