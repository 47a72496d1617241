use std::marker::PhantomData;

use crate::storage::{CacheData, SharedCacheStore};
use crate::utils::{gen_random_string, token_digest};

use super::errors::SessionError;
use super::types::SessionValue;

const TOKEN_BYTES: usize = 32;
const MAX_CREATE_ATTEMPTS: usize = 5;

/// Typed view over one prefix of a shared cache backend.
///
/// Tokens handed to callers are never stored as-is: entries are keyed by the
/// token's digest. Expiry comes from [`SessionValue::expires_at`].
pub struct SessionStore<T> {
    prefix: String,
    backend: SharedCacheStore,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SessionStore<T> {
    fn clone(&self) -> Self {
        Self {
            prefix: self.prefix.clone(),
            backend: self.backend.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: SessionValue> SessionStore<T> {
    pub fn new(prefix: impl Into<String>, backend: SharedCacheStore) -> Self {
        Self {
            prefix: prefix.into(),
            backend,
            _marker: PhantomData,
        }
    }

    fn encode(value: &T) -> Result<CacheData, SessionError> {
        Ok(CacheData::new(
            serde_json::to_string(value)?,
            value.user_id().map(str::to_string),
            value.expires_at(),
        ))
    }

    fn decode(data: CacheData) -> Result<T, SessionError> {
        Ok(serde_json::from_str(&data.value)?)
    }

    /// Stores `value` under a fresh random token and returns the token.
    pub async fn create(&self, value: &T) -> Result<String, SessionError> {
        let data = Self::encode(value)?;

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let token = gen_random_string(TOKEN_BYTES)?;
            let inserted = self
                .backend
                .put_if_not_exists(&self.prefix, &token_digest(&token), data.clone())
                .await?;

            if inserted {
                tracing::debug!(prefix = %self.prefix, "Created session entry");
                return Ok(token);
            }
            tracing::warn!(prefix = %self.prefix, attempt, "Session token collision, retrying");
        }

        Err(SessionError::KeyExhausted(MAX_CREATE_ATTEMPTS))
    }

    /// Stores `value` under a caller-chosen key. Returns false if a live entry
    /// already holds the key.
    pub async fn create_with_key(&self, key: &str, value: &T) -> Result<bool, SessionError> {
        let data = Self::encode(value)?;
        let inserted = self
            .backend
            .put_if_not_exists(&self.prefix, &token_digest(key), data)
            .await?;
        Ok(inserted)
    }

    pub async fn get(&self, token: &str) -> Result<Option<T>, SessionError> {
        let data = self
            .backend
            .get(&self.prefix, &token_digest(token))
            .await?;

        data.map(Self::decode).transpose()
    }

    /// Atomically reads and deletes the entry. Only one caller ever gets it.
    pub async fn consume(&self, token: &str) -> Result<Option<T>, SessionError> {
        let data = self
            .backend
            .take(&self.prefix, &token_digest(token))
            .await?;

        data.map(Self::decode).transpose()
    }

    pub async fn delete(&self, token: &str) -> Result<(), SessionError> {
        self.backend
            .remove(&self.prefix, &token_digest(token))
            .await?;
        Ok(())
    }

    /// Sweeps expired entries from the whole backend, not only this prefix.
    pub async fn purge_expired(&self) -> Result<usize, SessionError> {
        let removed = self.backend.purge_expired().await?;
        Ok(removed)
    }
}
