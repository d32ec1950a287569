//! Response cache with expiry
//!
//! Key-value store of query to answer. Keys are the verbatim query text
//! under a `response:` namespace - no normalization, so only an exact
//! repeat hits. Expired entries are deleted lazily on read; a batch sweep
//! is available but not required.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

const KEY_NAMESPACE: &str = "response:";

/// Cache key for a query: namespace tag plus the literal query text
pub fn cache_key(query: &str) -> String {
    format!("{}{}", KEY_NAMESPACE, query)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Port for the response cache so tests and production share one contract
pub trait ResponseCache: Send + Sync {
    /// Live value for a query, deleting it first when expired
    fn get(&self, query: &str) -> Option<String>;

    /// Unconditional overwrite, last writer wins
    fn set(&self, query: &str, value: &str, ttl: Duration);

    /// Batch-evict every expired entry, returning how many were removed
    fn purge_expired(&self) -> usize;

    /// Drop everything
    fn clear(&self);
}

/// In-memory cache adapter
#[derive(Default)]
pub struct MemoryResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResponseCache for MemoryResponseCache {
    fn get(&self, query: &str) -> Option<String> {
        let key = cache_key(query);
        let mut entries = self.entries.write().expect("cache lock poisoned");

        match entries.get(&key) {
            Some(entry) if Utc::now() < entry.expires_at => {
                tracing::debug!("Cache hit for key '{}'", key);
                Some(entry.value.clone())
            }
            Some(_) => {
                // Lazy eviction: expired on read
                entries.remove(&key);
                tracing::debug!("Cache entry '{}' expired, evicted", key);
                None
            }
            None => None,
        }
    }

    fn set(&self, query: &str, value: &str, ttl: Duration) {
        let key = cache_key(query);
        let entry = CacheEntry {
            value: value.to_string(),
            expires_at: Utc::now() + ttl,
        };
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key, entry);
    }

    fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| now < entry.expires_at);
        let purged = before - entries.len();
        if purged > 0 {
            tracing::info!("Purged {} expired cache entries", purged);
        }
        purged
    }

    fn clear(&self) {
        self.entries.write().expect("cache lock poisoned").clear();
    }
}
