//! Recovery of unsynced local edits at composition start.
//!
//! When the composer opens, the local snapshot (if any) is compared with the
//! server's draft. Recovery is offered only when the local copy is strictly
//! newer, when the server has no draft, or when the server cannot be
//! reached: losing user-authored text is worse than an unnecessary prompt.

use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use super::local::{LocalDraftStorage, LocalDrafts, SnapshotRead};
use super::model::{DraftContent, DraftSnapshot, RemoteDraft};
use super::remote::RemoteDraftStore;

/// Why recovery is being offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptReason {
    /// The local snapshot is newer than the server draft.
    LocalNewer,
    /// The server has no draft for this contact.
    NoRemoteDraft,
    /// The server could not be asked; local edits might be unsynced.
    RemoteUnavailable,
}

/// Outcome of the recovery check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// No local snapshot exists.
    NoSnapshot,
    /// The local snapshot was unreadable and has been deleted.
    DiscardedMalformed,
    /// The server draft is at least as new as the local snapshot.
    RemoteCurrent,
    /// Recovery should be offered.
    Prompt(PromptReason),
}

/// State exposed to the composer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryState {
    /// Message to show while a decision is pending.
    pub recovery_prompt: Option<String>,
    /// Draft the composer should load after [`recover`] or [`discard`].
    ///
    /// [`recover`]: DraftRecoveryResolver::recover
    /// [`discard`]: DraftRecoveryResolver::discard
    pub recovered_draft: Option<DraftContent>,
    /// Set when [`discard`](DraftRecoveryResolver::discard) could not load the
    /// server draft and fell back to an empty one.
    pub discard_error: Option<String>,
}

/// Decides, once per composer mount, whether to offer local recovery.
pub struct DraftRecoveryResolver<S, R> {
    user_id: String,
    contact_id: String,
    local: LocalDrafts<S>,
    remote: Arc<R>,
    decision: Option<RecoveryDecision>,
    pending: Option<DraftSnapshot>,
    fetched: Option<Option<RemoteDraft>>,
    state: RecoveryState,
}

impl<S: LocalDraftStorage, R: RemoteDraftStore> DraftRecoveryResolver<S, R> {
    /// Creates a resolver for one composer mount.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        contact_id: impl Into<String>,
        local: LocalDrafts<S>,
        remote: Arc<R>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            contact_id: contact_id.into(),
            local,
            remote,
            decision: None,
            pending: None,
            fetched: None,
            state: RecoveryState::default(),
        }
    }

    /// Runs the comparison. Only the first call does any work; later calls
    /// return the first decision without touching storage or the server.
    pub async fn check(&mut self) -> RecoveryDecision {
        if let Some(decision) = self.decision {
            return decision;
        }

        let decision = self.evaluate().await;
        self.decision = Some(decision);
        decision
    }

    async fn evaluate(&mut self) -> RecoveryDecision {
        let snapshot = match self.local.load(&self.user_id, &self.contact_id) {
            Ok(SnapshotRead::Found(snapshot)) => snapshot,
            Ok(SnapshotRead::Missing) => return RecoveryDecision::NoSnapshot,
            Ok(SnapshotRead::Malformed) => {
                self.discard_local();
                return RecoveryDecision::DiscardedMalformed;
            }
            Err(e) => {
                warn!("Could not read local draft for {}: {e}", self.contact_id);
                return RecoveryDecision::NoSnapshot;
            }
        };

        let reason = match self.remote.get_draft_by_contact(&self.contact_id).await {
            Err(e) => {
                warn!(
                    "Could not fetch draft for {}, offering local recovery: {e}",
                    self.contact_id
                );
                Some(PromptReason::RemoteUnavailable)
            }
            Ok(None) => {
                self.fetched = Some(None);
                Some(PromptReason::NoRemoteDraft)
            }
            Ok(Some(draft)) => {
                let local_newer = snapshot.captured_at_millis > draft.updated_at_millis();
                self.fetched = Some(Some(draft));
                local_newer.then_some(PromptReason::LocalNewer)
            }
        };

        match reason {
            Some(reason) => {
                debug!("Offering draft recovery for {}: {reason:?}", self.contact_id);
                self.state.recovery_prompt = Some(prompt_message(snapshot.captured_at_millis));
                self.pending = Some(snapshot);
                RecoveryDecision::Prompt(reason)
            }
            None => RecoveryDecision::RemoteCurrent,
        }
    }

    /// Adopts the local snapshot as the working draft.
    ///
    /// Leaves the snapshot in storage and the server untouched.
    pub fn recover(&mut self) {
        if let Some(snapshot) = self.pending.take() {
            self.state.recovered_draft = Some(snapshot.into_content());
        }
        self.state.recovery_prompt = None;
    }

    /// Deletes the local snapshot and adopts the server draft instead.
    ///
    /// Reuses the draft fetched by [`check`](Self::check) when there is one.
    /// If the server cannot be reached the working draft is empty and
    /// [`RecoveryState::discard_error`] explains why.
    pub async fn discard(&mut self) {
        self.discard_local();
        self.pending = None;

        let remote = match self.fetched.take() {
            Some(fetched) => Ok(fetched),
            None => self.remote.get_draft_by_contact(&self.contact_id).await,
        };

        match remote {
            Ok(draft) => {
                self.state.recovered_draft =
                    Some(draft.as_ref().map(RemoteDraft::content).unwrap_or_default());
                self.state.discard_error = None;
            }
            Err(e) => {
                warn!("Could not load server draft for {}: {e}", self.contact_id);
                self.state.recovered_draft = Some(DraftContent::default());
                self.state.discard_error = Some(format!("Could not load the saved draft: {e}"));
            }
        }
        self.state.recovery_prompt = None;
    }

    /// Current state for the composer.
    #[must_use]
    pub const fn state(&self) -> &RecoveryState {
        &self.state
    }

    /// Pending prompt, if a decision is awaited.
    #[must_use]
    pub fn recovery_prompt(&self) -> Option<&str> {
        self.state.recovery_prompt.as_deref()
    }

    /// Draft chosen by the last [`recover`](Self::recover) or
    /// [`discard`](Self::discard).
    #[must_use]
    pub const fn recovered_draft(&self) -> Option<&DraftContent> {
        self.state.recovered_draft.as_ref()
    }

    fn discard_local(&self) {
        if let Err(e) = self.local.discard(&self.user_id, &self.contact_id) {
            warn!("Failed to delete local draft for {}: {e}", self.contact_id);
        }
    }
}

fn prompt_message(captured_at_millis: i64) -> String {
    match DateTime::from_timestamp_millis(captured_at_millis) {
        Some(captured) => {
            let local = captured.with_timezone(&Local);
            format!(
                "You have unsaved changes from {}. Recover them?",
                local.format("%a, %b %d at %H:%M")
            )
        }
        None => "You have unsaved changes. Recover them?".to_string(),
    }
}
