use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CACHE_PREFIX, CacheStore, make_key};

/// Redis-backed store. Expiry is delegated to Redis via `PX`, with the
/// payload's `expires_at` still checked on read.
pub struct RedisCacheStore {
    client: redis::Client,
}

impl RedisCacheStore {
    pub fn new(url: &str) -> Result<Self, StorageError> {
        tracing::info!("Creating new redis generic cache store");
        Ok(Self {
            client: redis::Client::open(url)?,
        })
    }
}

/// Remaining lifetime in milliseconds, floored at 1 so Redis accepts it.
fn ttl_millis(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (expires_at - now).num_milliseconds().max(1) as u64
}

fn set_cmd(key: &str, value: &str, ttl_ms: u64, only_if_absent: bool) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if only_if_absent {
        cmd.arg("NX");
    }
    cmd.arg("PX").arg(ttl_ms);
    cmd
}

fn decode_live(raw: Option<String>) -> Result<Option<CacheData>, StorageError> {
    match raw {
        Some(v) => {
            let data: CacheData = serde_json::from_str(&v)?;
            Ok((!data.is_expired()).then_some(data))
        }
        None => Ok(None),
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        // Verify the connection works
        let _conn = self.client.get_multiplexed_async_connection().await?;
        Ok(())
    }

    async fn put(&self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = make_key(prefix, key);
        let ttl = ttl_millis(value.expires_at, Utc::now());
        let value = serde_json::to_string(&value)?;
        let _: Option<String> = set_cmd(&key, &value, ttl, false)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn put_if_not_exists(
        &self,
        prefix: &str,
        key: &str,
        value: CacheData,
    ) -> Result<bool, StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = make_key(prefix, key);
        let ttl = ttl_millis(value.expires_at, Utc::now());
        let value = serde_json::to_string(&value)?;

        // SET NX PX replies nil when the key already exists
        let reply: Option<String> = set_cmd(&key, &value, ttl, true)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let value: Option<String> = conn.get(make_key(prefix, key)).await?;
        decode_live(value)
    }

    async fn take(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let value: Option<String> = redis::cmd("GETDEL")
            .arg(make_key(prefix, key))
            .query_async(&mut conn)
            .await?;
        decode_live(value)
    }

    async fn remove(&self, prefix: &str, key: &str) -> Result<(), StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let _: () = conn.del(make_key(prefix, key)).await?;
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StorageError> {
        tracing::debug!("Redis expires {CACHE_PREFIX}:* keys itself; nothing to purge");
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn packed(cmd: &redis::Cmd) -> String {
        String::from_utf8_lossy(&cmd.get_packed_command()).into_owned()
    }

    #[test]
    fn test_ttl_millis() {
        // Given a fixed reference time
        let now = Utc::now();

        // Then the remaining lifetime is reported in milliseconds
        assert_eq!(ttl_millis(now + Duration::seconds(2), now), 2000);

        // And a past expiry is clamped to the minimum Redis accepts
        assert_eq!(ttl_millis(now - Duration::seconds(5), now), 1);
    }

    #[test]
    fn test_set_cmd_only_if_absent() {
        // Given a conditional set command
        let cmd = set_cmd("cache:p:k", "{}", 1500, true);

        // Then it carries NX and the millisecond expiry
        let text = packed(&cmd);
        assert!(text.contains("cache:p:k"));
        assert!(text.contains("NX"));
        assert!(text.contains("PX"));
        assert!(text.contains("1500"));
    }

    #[test]
    fn test_set_cmd_overwrite() {
        let text = packed(&set_cmd("cache:p:k", "{}", 10, false));
        assert!(!text.contains("NX"));
        assert!(text.contains("PX"));
    }

    #[test]
    fn test_decode_live_filters_expired() {
        let stale = CacheData::new("v".to_string(), None, Utc::now() - Duration::seconds(1));
        let fresh = CacheData::new("v".to_string(), None, Utc::now() + Duration::minutes(1));

        let stale_json = serde_json::to_string(&stale).unwrap();
        let fresh_json = serde_json::to_string(&fresh).unwrap();

        assert!(decode_live(Some(stale_json)).unwrap().is_none());
        assert_eq!(decode_live(Some(fresh_json)).unwrap(), Some(fresh));
        assert!(decode_live(None).unwrap().is_none());
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        assert!(matches!(
            RedisCacheStore::new("not a url"),
            Err(StorageError::Storage(_))
        ));
    }
}
