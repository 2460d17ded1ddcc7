//! `SQLite`-backed cache storage.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use sqlx::sqlite::{Sqlite, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row};
use tracing::debug;

use super::CacheBackend;
use crate::{CacheError, Result};

/// Cache backend persisting entries in a `SQLite` table.
///
/// Entries survive process restarts. Expiry is stored as epoch milliseconds
/// and checked on every read; [`purge_expired`](Self::purge_expired) reclaims
/// space. Key patterns use `SQLite`'s case-sensitive `GLOB`.
///
/// [`close`](CacheBackend::close) shuts the pool down and
/// [`connect`](CacheBackend::connect) opens a new one. An in-memory database
/// starts out empty again after reopening.
pub struct SqliteBackend {
    url: String,
    max_connections: u32,
    pool: Mutex<SqlitePool>,
}

impl SqliteBackend {
    /// Create a new backend with the given database path.
    ///
    /// Creates the database and table if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        Self::open(format!("sqlite:{database_path}?mode=rwc"), 5).await
    }

    /// Create an in-memory backend for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        Self::open("sqlite::memory:".to_string(), 1).await
    }

    async fn open(url: String, max_connections: u32) -> Result<Self> {
        let pool = Self::open_pool(&url, max_connections).await?;
        Ok(Self {
            url,
            max_connections,
            pool: Mutex::new(pool),
        })
    }

    async fn open_pool(url: &str, max_connections: u32) -> Result<SqlitePool> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Self::initialize(&pool).await?;
        Ok(pool)
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqlitePool>> {
        self.pool
            .lock()
            .map_err(|_| CacheError::Unavailable("sqlite pool lock poisoned".to_string()))
    }

    /// Handle to the current pool; cheap to clone.
    fn pool(&self) -> Result<SqlitePool> {
        Ok(self.lock()?.clone())
    }

    async fn initialize(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            ",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_cache_entries_expiry ON cache_entries(expires_at)
            ",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Deletes every expired entry, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool()?)
            .await?;

        debug!("Purged {} expired cache entries", result.rows_affected());
        Ok(result.rows_affected())
    }
}

impl CacheBackend for SqliteBackend {
    async fn connect(&self) -> Result<()> {
        let mut pool = self.pool()?;
        if pool.is_closed() {
            pool = Self::open_pool(&self.url, self.max_connections).await?;
            *self.lock()? = pool.clone();
            debug!("Reopened cache database");
        }

        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let pool = self.pool()?;
        pool.close().await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r"
            SELECT value FROM cache_entries
            WHERE key = ? AND expires_at > ?
            ",
        )
        .bind(key)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool()?)
        .await?;

        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str) -> Result<()> {
        let ttl_millis = i64::try_from(ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_millis);

        sqlx::query(
            r"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool()?)
        .await?;

        Ok(())
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r"
            SELECT key FROM cache_entries
            WHERE key GLOB ? AND expires_at > ?
            ORDER BY key
            ",
        )
        .bind(pattern)
        .bind(Utc::now().timestamp_millis())
        .fetch_all(&self.pool()?)
        .await?;

        Ok(rows.iter().map(|row| row.get::<String, _>("key")).collect())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("DELETE FROM cache_entries WHERE key IN (");
        let mut separated = builder.separated(", ");
        for key in keys {
            separated.push_bind(key.as_str());
        }
        separated.push_unseparated(")");

        let result = builder.build().execute(&self.pool()?).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_and_overwrite() {
        let backend = SqliteBackend::in_memory().await.unwrap();

        backend.set_with_expiry("k", 60, "first").await.unwrap();
        backend.set_with_expiry("k", 60, "second").await.unwrap();

        assert_eq!(backend.get("k").await.unwrap(), Some("second".to_string()));
        assert_eq!(backend.get("other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_never_visible() {
        let backend = SqliteBackend::in_memory().await.unwrap();

        backend.set_with_expiry("k", 0, "v").await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), None);
        assert!(backend.keys_matching("*").await.unwrap().is_empty());
        assert_eq!(backend.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_keys_matching_is_case_and_underscore_exact() {
        let backend = SqliteBackend::in_memory().await.unwrap();
        backend.set_with_expiry("p:user_1:c:x", 60, "1").await.unwrap();
        backend.set_with_expiry("p:userA1:c:y", 60, "2").await.unwrap();
        backend.set_with_expiry("p:USER_1:c:z", 60, "3").await.unwrap();

        let keys = backend.keys_matching("p:user_1:c:*").await.unwrap();
        assert_eq!(keys, vec!["p:user_1:c:x".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_many() {
        let backend = SqliteBackend::in_memory().await.unwrap();
        backend.set_with_expiry("a", 60, "1").await.unwrap();
        backend.set_with_expiry("b", 60, "2").await.unwrap();
        backend.set_with_expiry("c", 60, "3").await.unwrap();

        let removed = backend
            .delete_many(&["a".to_string(), "b".to_string(), "zzz".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(backend.keys_matching("*").await.unwrap(), vec!["c".to_string()]);
        assert_eq!(backend.delete_many(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_closed_pool_errors() {
        let backend = SqliteBackend::in_memory().await.unwrap();
        backend.close().await.unwrap();
        assert!(backend.get("k").await.is_err());
    }

    #[tokio::test]
    async fn test_connect_reopens_closed_pool() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let backend = SqliteBackend::new(&path.to_string_lossy()).await.unwrap();
        backend.set_with_expiry("k", 60, "v").await.unwrap();

        backend.close().await.unwrap();
        assert!(backend.get("k").await.is_err());

        backend.connect().await.unwrap();
        assert_eq!(backend.get("k").await.unwrap(), Some("v".to_string()));
        backend.set_with_expiry("k2", 60, "w").await.unwrap();
    }
}
