//! Draft durability while composing.
//!
//! Drafts live in two tiers: a fast local snapshot on the device and the
//! authoritative copy on the server. [`DraftAutoSaveCoordinator`] keeps both
//! up to date during editing, and [`DraftRecoveryResolver`] decides at
//! composer start whether a local snapshot should be offered back.

mod autosave;
mod graphql;
mod local;
mod model;
mod recovery;
mod remote;

pub use autosave::{AutoSaveStatus, DebounceWindows, DraftAutoSaveCoordinator, SaveState};
pub use graphql::GraphqlDraftClient;
pub use local::{
    FileStorage, LocalDraftStorage, LocalDrafts, MemoryStorage, SnapshotRead, snapshot_key,
};
pub use model::{AutoSaveDraftInput, DraftAttachment, DraftContent, DraftSnapshot, RemoteDraft};
pub use recovery::{DraftRecoveryResolver, PromptReason, RecoveryDecision, RecoveryState};
pub use remote::RemoteDraftStore;
