//! Cache backends.
//!
//! A backend is a plain key/value store with per-entry expiry and glob-style
//! key listing. The [`ResponseCacheService`](crate::ResponseCacheService)
//! sits on top and turns every backend failure into a miss or a no-op.

mod memory;
mod sqlite;

use std::future::Future;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

use crate::Result;

/// Key/value store with expiry, used as the storage layer of the cache.
///
/// Futures are `Send` so the service can be shared across tokio tasks.
pub trait CacheBackend: Send + Sync {
    /// Establishes (or re-establishes) connectivity.
    fn connect(&self) -> impl Future<Output = Result<()>> + Send;

    /// Releases the connection. Later operations fail until [`connect`](Self::connect).
    fn close(&self) -> impl Future<Output = Result<()>> + Send;

    /// Returns the raw value for `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Stores `value` under `key`, expiring after `ttl_secs` seconds.
    fn set_with_expiry(
        &self,
        key: &str,
        ttl_secs: u64,
        value: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Lists live keys matching a glob pattern (see [`glob_match`]).
    fn keys_matching(&self, pattern: &str) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Deletes the given keys, returning how many existed.
    fn delete_many(&self, keys: &[String]) -> impl Future<Output = Result<u64>> + Send;
}

/// Matches `text` against a glob pattern.
///
/// `*` matches any run of characters (including none) and `?` matches exactly
/// one character. Every other character matches itself.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    // Position of the last `*` seen and the text index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star, mark)) = backtrack {
            pi = star + 1;
            ti = mark + 1;
            backtrack = Some((star, mark + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '*')
}
