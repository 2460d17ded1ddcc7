//! Remote (authoritative) draft tier.

use std::future::Future;

use super::model::{AutoSaveDraftInput, RemoteDraft};
use crate::Result;

/// Backend service owning the authoritative copy of each draft.
///
/// Both operations must be safe to repeat: sending the same input twice
/// leaves the server in the same state as sending it once.
pub trait RemoteDraftStore: Send + Sync {
    /// Creates or updates the draft for `input.contact_id`.
    fn auto_save_draft(
        &self,
        input: AutoSaveDraftInput,
    ) -> impl Future<Output = Result<RemoteDraft>> + Send;

    /// Fetches the current draft for a contact, if one exists.
    fn get_draft_by_contact(
        &self,
        contact_id: &str,
    ) -> impl Future<Output = Result<Option<RemoteDraft>>> + Send;
}
