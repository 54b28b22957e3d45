// Disk-backed store on sled; each record carries its own expiry
use super::KeyValueStore;
use crate::error::{PriceIndexError, Result};
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize)]
struct StoredPrice {
    value: String,
    /// Unix epoch milliseconds. Wall clock, so expiry survives a restart.
    expires_at_ms: i64,
}

impl StoredPrice {
    fn new(value: &str, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            value: value.to_string(),
            expires_at_ms: now_ms().saturating_add(ttl_ms),
        }
    }

    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at_ms
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn backend(e: sled::Error) -> PriceIndexError {
    PriceIndexError::CacheError(e.to_string())
}

/// Price store persisted in a sled database, so cached prices outlive the
/// process for as long as their TTL allows.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(backend)?;
        Ok(Self { db })
    }

    // Removes `key` only if it still holds `raw`, so a concurrent refresh
    // is never deleted.
    fn remove_if_unchanged(&self, key: &[u8], raw: &[u8]) -> Result<bool> {
        let swapped = self
            .db
            .compare_and_swap(key, Some(raw), None::<&[u8]>)
            .map_err(backend)?;
        Ok(swapped.is_ok())
    }

    /// Drops every expired or unreadable record and returns how many were
    /// removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = now_ms();
        let mut removed = 0;
        for item in self.db.iter() {
            let (key, raw) = item.map_err(backend)?;
            let expired = match serde_json::from_slice::<StoredPrice>(&raw) {
                Ok(record) => record.is_expired(now),
                Err(_) => true,
            };
            if expired && self.remove_if_unchanged(&key, &raw)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Number of stored records, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for SledStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let raw = match self.db.get(key).map_err(backend)? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let record: StoredPrice = serde_json::from_slice(&raw)?;
        if !record.is_expired(now_ms()) {
            return Ok(Some(record.value));
        }

        if self.remove_if_unchanged(key.as_bytes(), &raw)? {
            debug!("[{}] evicted expired record", key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let record = serde_json::to_vec(&StoredPrice::new(value, ttl))?;
        self.db.insert(key, record).map_err(backend)?;
        self.db.flush_async().await.map_err(backend)?;
        Ok(())
    }
}
