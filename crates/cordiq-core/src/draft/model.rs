//! Draft data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Editable content of an email draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftContent {
    /// Subject line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Rendered HTML body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_html: Option<String>,
    /// Structured editor document the HTML was rendered from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_json: Option<Value>,
    /// Uploaded attachments referenced by the draft.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<DraftAttachment>>,
    /// Signature to append when sending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_id: Option<String>,
}

impl DraftContent {
    /// Returns true for the untouched initial state: no subject, no HTML body
    /// and no structured body. Attachments and signature do not count.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        let blank = |text: &Option<String>| text.as_deref().is_none_or(str::is_empty);
        blank(&self.subject)
            && blank(&self.body_html)
            && self.body_json.as_ref().is_none_or(Value::is_null)
    }
}

/// Reference to an attachment already uploaded to object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftAttachment {
    /// Storage key of the uploaded file.
    pub key: String,
    /// Original file name.
    pub filename: String,
    /// MIME type.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
}

/// Draft content captured into local storage, with the capture time.
///
/// A stored snapshot without `capturedAtMillis` fails to deserialize and is
/// treated as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    /// The captured content.
    #[serde(flatten)]
    pub content: DraftContent,
    /// Capture time in epoch milliseconds.
    pub captured_at_millis: i64,
}

impl DraftSnapshot {
    /// Creates a snapshot of `content` taken at `captured_at_millis`.
    #[must_use]
    pub const fn new(content: DraftContent, captured_at_millis: i64) -> Self {
        Self {
            content,
            captured_at_millis,
        }
    }

    /// Strips the capture time, keeping only the content.
    #[must_use]
    pub fn into_content(self) -> DraftContent {
        self.content
    }
}

/// Draft as stored by the backend service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDraft {
    /// Server-assigned identifier.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Contact the draft is addressed to.
    pub contact_id: String,
    /// Subject line.
    #[serde(default)]
    pub subject: Option<String>,
    /// Rendered HTML body.
    #[serde(default)]
    pub body_html: Option<String>,
    /// Structured editor document.
    #[serde(default)]
    pub body_json: Option<Value>,
    /// Attachments.
    #[serde(default)]
    pub attachments: Option<Vec<DraftAttachment>>,
    /// Signature reference.
    #[serde(default)]
    pub signature_id: Option<String>,
    /// Monotonic revision counter maintained by the server.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time; the authority for freshness comparisons.
    pub updated_at: DateTime<Utc>,
    /// Client timestamp of the sync that produced this revision.
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl RemoteDraft {
    /// Returns the editable part of the draft.
    #[must_use]
    pub fn content(&self) -> DraftContent {
        DraftContent {
            subject: self.subject.clone(),
            body_html: self.body_html.clone(),
            body_json: self.body_json.clone(),
            attachments: self.attachments.clone(),
            signature_id: self.signature_id.clone(),
        }
    }

    /// `updated_at` on the epoch-millisecond scale used by snapshots.
    #[must_use]
    pub fn updated_at_millis(&self) -> i64 {
        self.updated_at.timestamp_millis()
    }
}

/// Payload of the remote auto-save operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveDraftInput {
    /// Contact the draft is addressed to.
    pub contact_id: String,
    /// Content to persist.
    #[serde(flatten)]
    pub content: DraftContent,
    /// Client time at which the sync was issued.
    pub last_synced_at: DateTime<Utc>,
}
