//! # cordiq-cache
//!
//! Advisory response cache for expensive, mostly AI-generated, responses.
//!
//! This crate provides:
//! - Deterministic cache keys derived from `(user, contact, context)`
//! - A [`CacheBackend`] abstraction with in-memory and `SQLite` backends
//! - [`ResponseCacheService`], which never fails its caller: backend errors
//!   degrade to misses and no-ops
//! - Read-and-reset hit/miss metering

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod backend;
mod error;
pub mod key;
mod service;

pub use backend::{CacheBackend, MemoryBackend, SqliteBackend, glob_match};
pub use error::{CacheError, Result};
pub use key::{DEFAULT_KEY_PREFIX, belongs_to, cache_key, canonical_json, invalidation_pattern};
pub use service::{CacheMetrics, DEFAULT_TTL, ResponseCacheService};
