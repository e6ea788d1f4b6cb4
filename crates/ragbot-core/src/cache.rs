//! Summary cache abstraction.
//!
//! Generated summaries are cached under a [`CacheKey`] built from the
//! requesting user, the query scope, the query text, and the web-search flag.
//! Entries expire after a fixed time-to-live; an expired entry is never
//! returned.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Default entry lifetime: one hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Composite cache key for one query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds the key from `(user, scope, query_text, use_web_search)`.
    ///
    /// Fields are length-prefixed before hashing so that no two distinct
    /// tuples collide on separator characters in free text.
    pub fn new(user: &str, scope: &str, query_text: &str, use_web_search: bool) -> Self {
        let mut hasher = Sha256::new();
        for field in [user, scope, query_text] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        hasher.update([use_web_search as u8]);
        Self(format!("summary:{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A stored summary and its expiry (unix seconds).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: i64,
}

impl CacheEntry {
    pub fn new(key: &CacheKey, value: &str, ttl: Duration) -> Self {
        Self {
            key: key.as_str().to_string(),
            value: value.to_string(),
            expires_at: expiry_from_now(ttl),
        }
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Unix timestamp `ttl` from now.
pub fn expiry_from_now(ttl: Duration) -> i64 {
    chrono::Utc::now().timestamp() + ttl.as_secs() as i64
}

/// Key/value store for generated summaries.
#[async_trait]
pub trait SummaryCache: Send + Sync {
    /// Returns the cached value, or `None` if absent or expired.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>>;

    /// Stores `value`, overwriting any previous entry.
    async fn put(&self, key: &CacheKey, value: &str, ttl: Duration) -> Result<()>;
}

/// Process-local cache used by tests and the CLI.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SummaryCache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        let now = chrono::Utc::now().timestamp();
        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?;
        match entries.get(key.as_str()) {
            Some(entry) if !entry.is_expired_at(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key.as_str());
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &CacheKey, value: &str, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(key, value, ttl);
        self.entries
            .write()
            .map_err(|_| anyhow::anyhow!("cache lock poisoned"))?
            .insert(entry.key.clone(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_depends_on_every_field() {
        let base = CacheKey::new("alice", "all_files", "What's in the files?", false);
        assert_eq!(
            base,
            CacheKey::new("alice", "all_files", "What's in the files?", false)
        );
        assert_ne!(
            base,
            CacheKey::new("bob", "all_files", "What's in the files?", false)
        );
        assert_ne!(base, CacheKey::new("alice", "pdf", "What's in the files?", false));
        assert_ne!(base, CacheKey::new("alice", "all_files", "Other?", false));
        assert_ne!(
            base,
            CacheKey::new("alice", "all_files", "What's in the files?", true)
        );
    }

    #[test]
    fn key_fields_do_not_bleed() {
        assert_ne!(
            CacheKey::new("a:b", "c", "q", false),
            CacheKey::new("a", "b:c", "q", false)
        );
    }

    #[tokio::test]
    async fn memory_cache_roundtrip_and_overwrite() {
        let cache = MemoryCache::new();
        let key = CacheKey::new("u", "all_files", "q", false);
        assert_eq!(cache.get(&key).await.unwrap(), None);

        cache.put(&key, "first", DEFAULT_TTL).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("first"));

        cache.put(&key, "second", DEFAULT_TTL).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("second"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn expired_entries_are_dropped() {
        let cache = MemoryCache::new();
        let key = CacheKey::new("u", "pdf", "q", true);
        cache.put(&key, "stale", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert!(cache.is_empty());
    }
}
