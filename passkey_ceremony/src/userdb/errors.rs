use thiserror::Error;

use crate::storage::StorageError;

#[derive(Clone, Error, Debug)]
pub enum UserError {
    #[error("User not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<serde_json::Error> for UserError {
    fn from(err: serde_json::Error) -> Self {
        UserError::InvalidData(err.to_string())
    }
}

impl From<StorageError> for UserError {
    fn from(err: StorageError) -> Self {
        UserError::Storage(err.to_string())
    }
}

/// Maps an insert failure, reporting unique-key violations as `Conflict`.
pub(crate) fn map_insert_error(err: sqlx::Error, what: &str) -> UserError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            UserError::Conflict(format!("{what} already exists"))
        }
        _ => UserError::Storage(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_serde_json_error() {
        // Given a serde_json::Error
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();

        // When converting to UserError
        let user_error = UserError::from(json_error);

        // Then it is reported as invalid data
        match user_error {
            UserError::InvalidData(msg) => assert!(msg.contains("expected value")),
            _ => panic!("Expected InvalidData variant"),
        }
    }

    #[test]
    fn test_map_insert_error_non_unique() {
        let err = map_insert_error(sqlx::Error::RowNotFound, "Credential");
        assert!(matches!(err, UserError::Storage(_)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(UserError::NotFound.to_string(), "User not found");
        assert_eq!(
            UserError::Conflict("User already exists".to_string()).to_string(),
            "Conflict: User already exists"
        );
    }

    #[test]
    fn test_error_is_sync_and_send() {
        fn assert_sync_send<T: Sync + Send>() {}
        assert_sync_send::<UserError>();
    }
}
