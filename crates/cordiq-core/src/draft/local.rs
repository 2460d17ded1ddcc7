//! Local (device) draft tier.
//!
//! A synchronous key/value store holding one JSON snapshot per
//! `(user, contact)` pair. It is the fast safety net: written every couple of
//! seconds, never authoritative across devices.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use super::model::{DraftContent, DraftSnapshot};
use crate::{Error, Result};

/// Synchronous string key/value storage on the local device.
pub trait LocalDraftStorage: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be written.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local storage, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("memory storage lock poisoned".to_string()))
    }
}

impl LocalDraftStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Storage keeping one file per key inside a directory.
///
/// Keys are percent-encoded into file names, so distinct keys never share a
/// file. Writes go through a temporary file and a rename.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Opens (creating if needed) storage rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Default location under the platform data directory.
    #[must_use]
    pub fn default_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cordiq")
            .join("drafts")
    }

    /// Directory the files live in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 5);
        for byte in key.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                name.push(char::from(byte));
            } else {
                let _ = write!(name, "%{byte:02X}");
            }
        }
        name.push_str(".json");
        self.dir.join(name)
    }
}

impl LocalDraftStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Outcome of reading a local snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotRead {
    /// Nothing stored for the pair.
    Missing,
    /// Something is stored but it is not a valid snapshot.
    Malformed,
    /// A valid snapshot.
    Found(DraftSnapshot),
}

/// Storage key of the snapshot for a `(user, contact)` pair.
///
/// `%` and `:` inside either id are percent-encoded, so distinct pairs never
/// share a key.
#[must_use]
pub fn snapshot_key(user_id: &str, contact_id: &str) -> String {
    format!(
        "draft:{}:{}",
        encode_segment(user_id),
        encode_segment(contact_id)
    )
}

fn encode_segment(segment: &str) -> String {
    let mut encoded = String::with_capacity(segment.len());
    for ch in segment.chars() {
        match ch {
            '%' => encoded.push_str("%25"),
            ':' => encoded.push_str("%3A"),
            _ => encoded.push(ch),
        }
    }
    encoded
}

/// Draft snapshots on top of a [`LocalDraftStorage`].
#[derive(Debug)]
pub struct LocalDrafts<S> {
    storage: Arc<S>,
}

impl<S> Clone for LocalDrafts<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: LocalDraftStorage> LocalDrafts<S> {
    /// Wraps shared storage.
    #[must_use]
    pub const fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Returns the underlying storage.
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Writes a snapshot of `content` captured at `captured_at_millis`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the storage write fails.
    pub fn save(
        &self,
        user_id: &str,
        contact_id: &str,
        content: &DraftContent,
        captured_at_millis: i64,
    ) -> Result<()> {
        let snapshot = DraftSnapshot::new(content.clone(), captured_at_millis);
        let encoded = serde_json::to_string(&snapshot)?;
        self.storage
            .set(&snapshot_key(user_id, contact_id), &encoded)
    }

    /// Reads the snapshot for a `(user, contact)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error only if the storage itself cannot be read; an
    /// unparseable value is reported as [`SnapshotRead::Malformed`].
    pub fn load(&self, user_id: &str, contact_id: &str) -> Result<SnapshotRead> {
        let key = snapshot_key(user_id, contact_id);
        let Some(raw) = self.storage.get(&key)? else {
            return Ok(SnapshotRead::Missing);
        };

        match serde_json::from_str::<DraftSnapshot>(&raw) {
            Ok(snapshot) => Ok(SnapshotRead::Found(snapshot)),
            Err(e) => {
                debug!("Local draft {key} is malformed: {e}");
                Ok(SnapshotRead::Malformed)
            }
        }
    }

    /// Deletes the snapshot for a `(user, contact)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage write fails.
    pub fn discard(&self, user_id: &str, contact_id: &str) -> Result<()> {
        self.storage.remove(&snapshot_key(user_id, contact_id))
    }
}
