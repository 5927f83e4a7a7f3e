//! Expiring key-value cache seam.
//!
//! The secret vault and the derived-identity memo cache talk to an external
//! cache through [`ExpiringCache`]; [`MemoryCache`] is the in-process
//! implementation used standalone and in tests. Expiry is evaluated by
//! timestamp comparison at read time, never by background eviction, so an
//! expired-but-not-yet-evicted entry is rejected on read.

use crate::clock;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

#[async_trait]
pub trait ExpiringCache: Send + Sync {
    /// Fetch a live value, `None` when absent or expired.
    async fn try_get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous one. `None` means no expiry.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// Drop a value; returns whether a live entry was removed.
    async fn remove(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    /// Unix seconds after which the entry is dead; `None` never expires.
    expires_at: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory [`ExpiringCache`]. Not durable; single-process consistency only.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpiringCache for MemoryCache {
    async fn try_get(&self, key: &str) -> Result<Option<String>> {
        let now = clock::now_unix();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Lazily drop the expired entry so the map does not grow unbounded.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|ttl| clock::now_unix() + ttl.as_secs() as i64);
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let now = clock::now_unix();
        let mut entries = self.entries.write().await;
        match entries.remove(key) {
            Some(entry) => Ok(!entry.is_expired(now)),
            None => Ok(false),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.try_get(key).await?.is_some())
    }
}
