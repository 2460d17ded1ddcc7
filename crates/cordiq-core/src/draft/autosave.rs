//! Debounced two-tier draft auto-save.
//!
//! Every edit re-arms two independent trailing debounces:
//!
//! - **local** (2 s by default): writes a timestamped snapshot to device
//!   storage. Failures are logged and otherwise invisible.
//! - **remote** (10 s by default): sends the draft to the backend. Failures
//!   surface as [`SaveState::Error`] with the message kept for display; there
//!   is no automatic retry, the next edit re-arms the timer.
//!
//! Re-arming a tier cancels only that tier's pending timer. A remote sync
//! that is already in flight is never aborted, but once the coordinator has
//! shut down its result is ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::local::{LocalDraftStorage, LocalDrafts};
use super::model::{AutoSaveDraftInput, DraftContent};
use super::remote::RemoteDraftStore;
use crate::time::Clock;

/// Phase of the most recent save transition from either tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveState {
    /// Nothing saved yet.
    #[default]
    Idle,
    /// Writing the local snapshot.
    Saving,
    /// Local snapshot written.
    Saved,
    /// Remote sync in flight.
    Syncing,
    /// Remote sync succeeded.
    Synced,
    /// Remote sync failed.
    Error,
}

/// Observable auto-save status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveStatus {
    /// Latest transition.
    pub state: SaveState,
    /// Time of the last successful save on either tier.
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Message of the last failed remote sync, cleared by the next success.
    pub error: Option<String>,
}

/// Quiet periods of the two tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceWindows {
    /// Local snapshot window.
    pub local: Duration,
    /// Remote sync window.
    pub remote: Duration,
}

impl Default for DebounceWindows {
    fn default() -> Self {
        Self {
            local: Duration::from_secs(2),
            remote: Duration::from_secs(10),
        }
    }
}

/// State shared between the coordinator and its timer tasks.
struct Shared<S, R> {
    user_id: String,
    contact_id: String,
    local: LocalDrafts<S>,
    remote: Arc<R>,
    clock: Arc<dyn Clock>,
    status: watch::Sender<AutoSaveStatus>,
    active: AtomicBool,
}

impl<S: LocalDraftStorage, R: RemoteDraftStore> Shared<S, R> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn save_local(&self, content: &DraftContent) {
        if !self.is_active() {
            return;
        }

        let previous = self.status.borrow().clone();
        self.status.send_replace(AutoSaveStatus {
            state: SaveState::Saving,
            ..previous.clone()
        });

        let captured_at = self.clock.now_millis();
        match self
            .local
            .save(&self.user_id, &self.contact_id, content, captured_at)
        {
            Ok(()) => {
                debug!(
                    "Saved local draft for {}/{}",
                    self.user_id, self.contact_id
                );
                let saved_at = self.clock.now();
                self.status.send_modify(|status| {
                    status.state = SaveState::Saved;
                    status.last_saved_at = Some(saved_at);
                });
            }
            Err(e) => {
                warn!(
                    "Failed to save local draft for {}/{}: {e}",
                    self.user_id, self.contact_id
                );
                self.status.send_replace(previous);
            }
        }
    }

    async fn sync_remote(&self, content: DraftContent) {
        if !self.is_active() {
            return;
        }

        self.status
            .send_modify(|status| status.state = SaveState::Syncing);

        let input = AutoSaveDraftInput {
            contact_id: self.contact_id.clone(),
            content,
            last_synced_at: self.clock.now(),
        };
        let result = self.remote.auto_save_draft(input).await;

        if !self.is_active() {
            debug!(
                "Ignoring draft sync result for {} after shutdown",
                self.contact_id
            );
            return;
        }

        match result {
            Ok(draft) => {
                debug!(
                    "Synced draft for {} (version {})",
                    self.contact_id, draft.version
                );
                let synced_at = self.clock.now();
                self.status.send_modify(|status| {
                    status.state = SaveState::Synced;
                    status.last_saved_at = Some(synced_at);
                    status.error = None;
                });
            }
            Err(e) => {
                warn!("Failed to sync draft for {}: {e}", self.contact_id);
                self.status.send_modify(|status| {
                    status.state = SaveState::Error;
                    status.error = Some(e.to_string());
                });
            }
        }
    }
}

/// Keeps one `(user, contact)` draft durable while it is being edited.
///
/// Timers run as tokio tasks, so the coordinator must be used inside a tokio
/// runtime. Dropping it is equivalent to [`shutdown`](Self::shutdown).
pub struct DraftAutoSaveCoordinator<S, R>
where
    S: LocalDraftStorage + 'static,
    R: RemoteDraftStore + 'static,
{
    shared: Arc<Shared<S, R>>,
    windows: DebounceWindows,
    local_timer: Option<JoinHandle<()>>,
    remote_timer: Option<JoinHandle<()>>,
}

impl<S, R> DraftAutoSaveCoordinator<S, R>
where
    S: LocalDraftStorage + 'static,
    R: RemoteDraftStore + 'static,
{
    /// Creates a coordinator for the draft addressed to `contact_id`.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        contact_id: impl Into<String>,
        local: LocalDrafts<S>,
        remote: Arc<R>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (status, _) = watch::channel(AutoSaveStatus::default());
        Self {
            shared: Arc::new(Shared {
                user_id: user_id.into(),
                contact_id: contact_id.into(),
                local,
                remote,
                clock,
                status,
                active: AtomicBool::new(true),
            }),
            windows: DebounceWindows::default(),
            local_timer: None,
            remote_timer: None,
        }
    }

    /// Overrides the debounce windows.
    #[must_use]
    pub fn with_windows(mut self, windows: DebounceWindows) -> Self {
        self.windows = windows;
        self
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> AutoSaveStatus {
        self.shared.status.borrow().clone()
    }

    /// Subscribes to status transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AutoSaveStatus> {
        self.shared.status.subscribe()
    }

    /// Records an edit. Re-arms both tiers unless `content` is pristine.
    ///
    /// A pristine edit saves nothing and cancels the pending saves, so text
    /// the user has since cleared is not written after the fact.
    pub fn content_changed(&mut self, content: DraftContent) {
        if !self.shared.is_active() {
            return;
        }
        if content.is_pristine() {
            debug!("Skipping auto-save of pristine draft");
            self.cancel_timers();
            return;
        }

        self.arm_local(content.clone());
        self.arm_remote(content);
    }

    /// Cancels pending timers and saves both tiers immediately.
    pub async fn save_now(&mut self, content: DraftContent) {
        self.cancel_timers();
        if !self.shared.is_active() || content.is_pristine() {
            return;
        }

        self.shared.save_local(&content);
        self.shared.sync_remote(content).await;
    }

    /// Deletes the local snapshot, typically after the draft was sent.
    pub fn clear_local(&self) {
        if let Err(e) = self
            .shared
            .local
            .discard(&self.shared.user_id, &self.shared.contact_id)
        {
            warn!(
                "Failed to clear local draft for {}/{}: {e}",
                self.shared.user_id, self.shared.contact_id
            );
        }
    }

    /// Cancels pending timers without flushing. In-flight syncs complete but
    /// no longer update the status.
    pub fn shutdown(&mut self) {
        self.shared.active.store(false, Ordering::SeqCst);
        self.cancel_timers();
    }

    fn cancel_timers(&mut self) {
        if let Some(timer) = self.local_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.remote_timer.take() {
            timer.abort();
        }
    }

    fn arm_local(&mut self, content: DraftContent) {
        if let Some(timer) = self.local_timer.take() {
            timer.abort();
        }

        let shared = Arc::clone(&self.shared);
        let window = self.windows.local;
        self.local_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            shared.save_local(&content);
        }));
    }

    fn arm_remote(&mut self, content: DraftContent) {
        if let Some(timer) = self.remote_timer.take() {
            timer.abort();
        }

        let shared = Arc::clone(&self.shared);
        let window = self.windows.remote;
        self.remote_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // Detached so re-arming never aborts a request already on the wire
            tokio::spawn(async move {
                shared.sync_remote(content).await;
            });
        }));
    }
}

impl<S, R> Drop for DraftAutoSaveCoordinator<S, R>
where
    S: LocalDraftStorage + 'static,
    R: RemoteDraftStore + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
