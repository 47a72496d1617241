use thiserror::Error;

use crate::storage::StorageError;
use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Json conversion(Serde) error: {0}")]
    Serde(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Could not allocate a unique token after {0} attempts")]
    KeyExhausted(usize),
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

impl From<UtilError> for SessionError {
    fn from(err: UtilError) -> Self {
        Self::Crypto(err.to_string())
    }
}
