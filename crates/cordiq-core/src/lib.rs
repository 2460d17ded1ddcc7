//! # cordiq-core
//!
//! Client-side draft handling for Cordiq.
//!
//! This crate provides:
//! - **Auto-save** - debounced local snapshots and remote sync while editing
//! - **Recovery** - offering unsynced local edits back when a composer opens
//! - **Draft service client** - GraphQL access to the authoritative drafts
//! - Configuration loading and the shared clock abstraction
//!
//! Cached AI responses live in [`cordiq_cache`], re-exported here as
//! [`cache`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod draft;
mod error;
pub mod time;

pub use cordiq_cache as cache;

pub use config::{CacheConfig, CordiqConfig, DraftConfig, RemoteConfig};
pub use draft::{
    AutoSaveStatus, DebounceWindows, DraftAutoSaveCoordinator, DraftContent,
    DraftRecoveryResolver, GraphqlDraftClient, LocalDraftStorage, LocalDrafts, RecoveryDecision,
    RemoteDraft, RemoteDraftStore, SaveState,
};
pub use error::{Error, Result};
pub use time::{Clock, MockClock, SystemClock};
