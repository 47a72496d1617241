use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Data stored in the cache
///
/// `value` is the serialized payload. `expires_at` is authoritative for every
/// backend: an entry past it is treated as absent whether or not the backend
/// has reclaimed it yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheData {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl CacheData {
    pub fn new(value: String, user_id: Option<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value,
            user_id,
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
