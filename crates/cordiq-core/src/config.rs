//! Configuration.
//!
//! Loaded from `config.json` in the platform config directory. A missing
//! file yields the defaults; every section and field is optional.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cordiq_cache::{CacheBackend, DEFAULT_KEY_PREFIX, ResponseCacheService, SqliteBackend};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::draft::{DebounceWindows, FileStorage};
use crate::{Error, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CordiqConfig {
    /// Draft auto-save settings.
    pub drafts: DraftConfig,
    /// Response cache settings.
    pub cache: CacheConfig,
    /// Draft service connection.
    pub remote: RemoteConfig,
}

/// Draft auto-save settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftConfig {
    /// Quiet period before a local snapshot is written.
    pub local_debounce_ms: u64,
    /// Quiet period before the draft is synced to the server.
    pub remote_debounce_ms: u64,
    /// Directory for local snapshots; platform data dir when unset.
    pub storage_dir: Option<PathBuf>,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            local_debounce_ms: 2_000,
            remote_debounce_ms: 10_000,
            storage_dir: None,
        }
    }
}

impl DraftConfig {
    /// Debounce windows for the auto-save coordinator.
    #[must_use]
    pub const fn windows(&self) -> DebounceWindows {
        DebounceWindows {
            local: Duration::from_millis(self.local_debounce_ms),
            remote: Duration::from_millis(self.remote_debounce_ms),
        }
    }

    /// Opens file storage for local snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open_storage(&self) -> Result<FileStorage> {
        let dir = self
            .storage_dir
            .clone()
            .unwrap_or_else(FileStorage::default_dir);
        FileStorage::open(dir)
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of cached responses, in seconds.
    pub ttl_secs: u64,
    /// Prefix of every cache key.
    pub key_prefix: String,
    /// `SQLite` file for the persistent backend; platform data dir when unset.
    pub database_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3_600,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            database_path: None,
        }
    }
}

impl CacheConfig {
    /// Entry lifetime.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Wraps `backend` in a cache service using these settings.
    #[must_use]
    pub fn build<B: CacheBackend>(&self, backend: B) -> ResponseCacheService<B> {
        ResponseCacheService::new(backend)
            .with_ttl(self.ttl())
            .with_prefix(self.key_prefix.clone())
    }

    /// Opens the `SQLite`-backed cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory or database cannot be created.
    pub async fn open_sqlite(&self) -> Result<ResponseCacheService<SqliteBackend>> {
        let path = match &self.database_path {
            Some(path) => path.clone(),
            None => {
                let dir = dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("cordiq");
                tokio::fs::create_dir_all(&dir).await?;
                dir.join("cache.db")
            }
        };
        let backend = SqliteBackend::new(&path.to_string_lossy()).await?;
        Ok(self.build(backend))
    }
}

/// Draft service connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// GraphQL endpoint URL.
    pub endpoint: Option<String>,
    /// Bearer token sent with each request.
    pub access_token: Option<String>,
    /// Request timeout, in seconds.
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_token: None,
            timeout_secs: 30,
        }
    }
}

impl CordiqConfig {
    /// Default configuration file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cordiq")
            .join("config.json")
    }

    /// Loads and validates configuration from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        Ok(())
    }

    /// Checks value ranges and formats.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.drafts.local_debounce_ms == 0 {
            return Err(Error::Config("drafts.local_debounce_ms must be > 0".to_string()));
        }
        if self.drafts.remote_debounce_ms == 0 {
            return Err(Error::Config(
                "drafts.remote_debounce_ms must be > 0".to_string(),
            ));
        }
        if self.cache.ttl_secs == 0 {
            return Err(Error::Config("cache.ttl_secs must be > 0".to_string()));
        }
        if self.cache.key_prefix.is_empty()
            || self.cache.key_prefix.contains(['*', '?', '['])
        {
            return Err(Error::Config(
                "cache.key_prefix must be non-empty and free of glob characters".to_string(),
            ));
        }
        if self.remote.timeout_secs == 0 {
            return Err(Error::Config("remote.timeout_secs must be > 0".to_string()));
        }
        if let Some(endpoint) = &self.remote.endpoint {
            let url = Url::parse(endpoint)?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "remote.endpoint must be http(s), got {}",
                    url.scheme()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CordiqConfig::default();
        assert_eq!(config.drafts.windows().local, Duration::from_secs(2));
        assert_eq!(config.drafts.windows().remote, Duration::from_secs(10));
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.cache.key_prefix, "email:template");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: CordiqConfig =
            serde_json::from_str(r#"{"drafts": {"remote_debounce_ms": 5000}}"#).unwrap();
        assert_eq!(config.drafts.local_debounce_ms, 2_000);
        assert_eq!(config.drafts.remote_debounce_ms, 5_000);
        assert_eq!(config.remote.timeout_secs, 30);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = CordiqConfig::default();
        config.cache.key_prefix = "email:*".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = CordiqConfig::default();
        config.remote.endpoint = Some("ftp://example.com/graphql".to_string());
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = CordiqConfig::default();
        config.remote.endpoint = Some("::nope".to_string());
        assert!(matches!(config.validate(), Err(Error::Url(_))));

        let mut config = CordiqConfig::default();
        config.drafts.local_debounce_ms = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CordiqConfig::load(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(config, CordiqConfig::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = CordiqConfig::default();
        config.remote.endpoint = Some("https://api.cordiq.app/graphql".to_string());
        config.drafts.storage_dir = Some(dir.path().join("drafts"));
        config.save(&path).await.unwrap();

        assert_eq!(CordiqConfig::load(&path).await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_open_sqlite_cache_uses_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            ttl_secs: 60,
            key_prefix: "reply".to_string(),
            database_path: Some(dir.path().join("cache.db")),
        };

        let cache = config.open_sqlite().await.unwrap();
        let key = cache.key("u1", "c1", &serde_json::json!({"x": 1}));
        assert!(key.starts_with("reply:u1:c1:"));
        cache.set(&key, &"hello").await;
        assert_eq!(cache.get::<String>(&key).await.as_deref(), Some("hello"));
    }
}
