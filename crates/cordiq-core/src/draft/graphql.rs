//! GraphQL client for the Cordiq draft service.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use super::model::{AutoSaveDraftInput, RemoteDraft};
use super::remote::RemoteDraftStore;
use crate::config::RemoteConfig;
use crate::{Error, Result};

const AUTO_SAVE_MUTATION: &str = r"
mutation AutoSaveDraft($input: AutoSaveDraftInput!) {
  autoSaveDraft(input: $input) {
    id userId contactId subject bodyHtml bodyJson attachments signatureId
    version createdAt updatedAt lastSyncedAt
  }
}
";

const DRAFT_BY_CONTACT_QUERY: &str = r"
query DraftByContact($contactId: String!) {
  draftByContact(contactId: $contactId) {
    id userId contactId subject bodyHtml bodyJson attachments signatureId
    version createdAt updatedAt lastSyncedAt
  }
}
";

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoSaveData {
    auto_save_draft: RemoteDraft,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DraftByContactData {
    draft_by_contact: Option<RemoteDraft>,
}

impl<T> GraphqlResponse<T> {
    fn into_data(self) -> Result<T> {
        if !self.errors.is_empty() {
            let messages: Vec<String> = self.errors.into_iter().map(|e| e.message).collect();
            return Err(Error::Remote(messages.join("; ")));
        }
        self.data
            .ok_or_else(|| Error::Remote("response contained no data".to_string()))
    }
}

/// Draft store speaking to the backend's GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct GraphqlDraftClient {
    endpoint: Url,
    access_token: Option<String>,
    http_client: Client,
}

impl GraphqlDraftClient {
    /// Creates a client for `endpoint` with a 30 second request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a valid URL or the HTTP client
    /// cannot be built.
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(30))
    }

    fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)?;
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint,
            access_token: None,
            http_client,
        })
    }

    /// Builds a client from the `remote` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no endpoint is configured, or the errors
    /// of [`GraphqlDraftClient::new`].
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::Config("remote.endpoint is not set".to_string()))?;
        let client = Self::with_timeout(endpoint, Duration::from_secs(config.timeout_secs))?;
        Ok(match &config.access_token {
            Some(token) => client.with_access_token(token.clone()),
            None => client,
        })
    }

    /// Sets the bearer token sent with every request.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// The endpoint requests are sent to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn execute<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let mut request = self
            .http_client
            .post(self.endpoint.clone())
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?.error_for_status()?;
        let envelope: GraphqlResponse<T> = response.json().await?;
        envelope.into_data()
    }
}

impl RemoteDraftStore for GraphqlDraftClient {
    async fn auto_save_draft(&self, input: AutoSaveDraftInput) -> Result<RemoteDraft> {
        let variables = json!({ "input": serde_json::to_value(&input)? });
        let data: AutoSaveData = self.execute(AUTO_SAVE_MUTATION, variables).await?;
        debug!(
            "Draft for contact {} synced at version {}",
            input.contact_id, data.auto_save_draft.version
        );
        Ok(data.auto_save_draft)
    }

    async fn get_draft_by_contact(&self, contact_id: &str) -> Result<Option<RemoteDraft>> {
        let variables = json!({ "contactId": contact_id });
        let data: DraftByContactData = self.execute(DRAFT_BY_CONTACT_QUERY, variables).await?;
        Ok(data.draft_by_contact)
    }
}
