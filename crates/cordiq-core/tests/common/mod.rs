//! Test doubles shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::DateTime;
use cordiq_core::draft::{
    AutoSaveDraftInput, DraftContent, LocalDraftStorage, MemoryStorage, RemoteDraft,
    RemoteDraftStore,
};
use cordiq_core::{Error, Result};

/// Routes test logs through the test harness. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Draft with the given subject and a matching HTML body.
pub fn content(subject: &str) -> DraftContent {
    DraftContent {
        subject: Some(subject.to_string()),
        body_html: Some(format!("<p>{subject}</p>")),
        ..Default::default()
    }
}

/// Server draft for `contact_id` last modified at `updated_at_millis`.
pub fn remote_draft(contact_id: &str, subject: &str, updated_at_millis: i64) -> RemoteDraft {
    let updated_at = DateTime::from_timestamp_millis(updated_at_millis).unwrap();
    let content = content(subject);
    RemoteDraft {
        id: format!("draft-{contact_id}"),
        user_id: "user-1".to_string(),
        contact_id: contact_id.to_string(),
        subject: content.subject,
        body_html: content.body_html,
        body_json: None,
        attachments: None,
        signature_id: None,
        version: 1,
        created_at: updated_at,
        updated_at,
        last_synced_at: Some(updated_at),
    }
}

/// In-memory storage that counts writes and can be told to fail them.
#[derive(Debug, Default)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl RecordingStorage {
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl LocalDraftStorage for RecordingStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("quota exceeded".to_string()));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.inner.remove(key)
    }
}

/// Draft service double recording every call.
#[derive(Debug, Default)]
pub struct FakeRemote {
    saves: Mutex<Vec<AutoSaveDraftInput>>,
    completed: AtomicUsize,
    fetches: AtomicUsize,
    drafts: Mutex<HashMap<String, RemoteDraft>>,
    fail_saves: AtomicBool,
    fail_fetches: AtomicBool,
    delay_ms: AtomicI64,
}

impl FakeRemote {
    pub fn insert(&self, draft: RemoteDraft) {
        self.drafts
            .lock()
            .unwrap()
            .insert(draft.contact_id.clone(), draft);
    }

    /// Inputs of every save request received, in order.
    pub fn saves(&self) -> Vec<AutoSaveDraftInput> {
        self.saves.lock().unwrap().clone()
    }

    /// Save requests that ran to completion.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Makes every save take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        let millis = i64::try_from(delay.as_millis()).unwrap();
        self.delay_ms.store(millis, Ordering::SeqCst);
    }
}

impl RemoteDraftStore for FakeRemote {
    async fn auto_save_draft(&self, input: AutoSaveDraftInput) -> Result<RemoteDraft> {
        self.saves.lock().unwrap().push(input.clone());

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay.unsigned_abs())).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Remote("service unavailable".to_string()));
        }

        let mut drafts = self.drafts.lock().unwrap();
        let mut draft = drafts.get(&input.contact_id).cloned().unwrap_or_else(|| {
            remote_draft(&input.contact_id, "", input.last_synced_at.timestamp_millis())
        });
        draft.subject = input.content.subject;
        draft.body_html = input.content.body_html;
        draft.body_json = input.content.body_json;
        draft.attachments = input.content.attachments;
        draft.signature_id = input.content.signature_id;
        draft.version += 1;
        draft.updated_at = input.last_synced_at;
        draft.last_synced_at = Some(input.last_synced_at);
        drafts.insert(input.contact_id, draft.clone());
        Ok(draft)
    }

    async fn get_draft_by_contact(&self, contact_id: &str) -> Result<Option<RemoteDraft>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(Error::Remote("network unreachable".to_string()));
        }
        Ok(self.drafts.lock().unwrap().get(contact_id).cloned())
    }
}
