//! In-process cache backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use super::{CacheBackend, glob_match};
use crate::{CacheError, Result};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Cache backend holding entries in process memory.
///
/// Expiry uses tokio's clock, so tests running with a paused runtime can
/// advance time past a TTL deterministically. Expired entries are dropped
/// lazily when they are next touched.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Entry>>,
    connected: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty, connected backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
        }
    }

    /// Number of entries currently stored, including not-yet-purged expired ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry map lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    /// Returns true if no entries are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry map lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".to_string()))
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CacheError::NotConnected)
        }
    }
}

impl CacheBackend for MemoryBackend {
    async fn connect(&self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_connected()?;
        let now = Instant::now();
        let mut entries = self.lock()?;

        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &str) -> Result<()> {
        self.ensure_connected()?;
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        self.ensure_connected()?;
        let now = Instant::now();
        let mut entries = self.lock()?;
        entries.retain(|_, entry| entry.is_live(now));

        let mut keys: Vec<String> = entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64> {
        self.ensure_connected()?;
        let mut entries = self.lock()?;
        let removed = keys.iter().filter(|key| entries.remove(*key).is_some()).count();
        Ok(removed as u64)
    }
}
