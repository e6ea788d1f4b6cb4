//! SQLite-backed [`SummaryCache`].
//!
//! Entries persist in the `summary_cache` table with an absolute
//! `expires_at` (unix seconds). Expired rows are ignored on read and removed
//! lazily.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use ragbot_core::cache::{expiry_from_now, CacheKey, SummaryCache};

pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Deletes every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM summary_cache WHERE expires_at <= ?")
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SummaryCache for SqliteCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>> {
        let now = chrono::Utc::now().timestamp();
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT value, expires_at FROM summary_cache WHERE key = ?")
                .bind(key.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((value, expires_at)) if expires_at > now => Ok(Some(value)),
            Some(_) => {
                sqlx::query("DELETE FROM summary_cache WHERE key = ?")
                    .bind(key.as_str())
                    .execute(&self.pool)
                    .await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &CacheKey, value: &str, ttl: Duration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO summary_cache (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at
            "#,
        )
        .bind(key.as_str())
        .bind(value)
        .bind(expiry_from_now(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, migrate};
    use ragbot_core::cache::DEFAULT_TTL;
    use tempfile::TempDir;

    async fn cache() -> (TempDir, SqliteCache) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("c.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, SqliteCache::new(pool))
    }

    #[tokio::test]
    async fn put_get_overwrite() {
        let (_tmp, cache) = cache().await;
        let key = CacheKey::new("default", "all_files", "What's in the files?", false);
        assert_eq!(cache.get(&key).await.unwrap(), None);

        cache.put(&key, "summary one", DEFAULT_TTL).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("summary one"));

        cache.put(&key, "summary two", DEFAULT_TTL).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("summary two"));
    }

    #[tokio::test]
    async fn expired_entries_are_not_served() {
        let (_tmp, cache) = cache().await;
        let key = CacheKey::new("default", "pdf", "q", true);
        cache.put(&key, "old", Duration::ZERO).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);

        let other = CacheKey::new("default", "csv", "q", true);
        cache.put(&other, "old", Duration::ZERO).await.unwrap();
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
    }
}
