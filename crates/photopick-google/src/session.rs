//! The picker session proxy.
//!
//! Thin authenticated wrappers over the picker endpoints that reshape wire
//! responses into the types the poll loop and the gallery consume.

use chrono::{DateTime, Utc};
use photopick_core::time::{parse_timestamp, picker_duration_millis};
use photopick_core::{MediaItem, MediaKind};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::{ApiPickedMediaItem, ApiSession, PickerApiClient};
use crate::config::PickerConfig;
use crate::credentials::CredentialSource;
use crate::error::{PickerError, PickerResult};

/// Poll interval used when the session does not advertise one.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// A newly created picker session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedSession {
    pub session_id: String,
    /// Where the user picks photos.
    pub picker_uri: String,
    pub poll_interval_ms: u64,
    /// `None` when the session did not advertise a timeout.
    pub timeout_ms: Option<u64>,
    pub expire_time: Option<DateTime<Utc>>,
}

/// Result of polling a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub session_id: String,
    /// True once the user has finished picking.
    pub media_items_set: bool,
    pub expire_time: Option<DateTime<Utc>>,
}

impl SessionStatus {
    fn pending(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            media_items_set: false,
            expire_time: None,
        }
    }
}

/// One page of picked items.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaItemPage {
    pub items: Vec<MediaItem>,
    pub next_page_token: Option<String>,
}

/// Session operations authenticated through a [`CredentialSource`].
pub struct PickerSessions<C> {
    client: PickerApiClient,
    credentials: C,
}

impl<C: CredentialSource> PickerSessions<C> {
    pub fn new(config: &PickerConfig, credentials: C) -> PickerResult<Self> {
        Ok(Self::with_client(PickerApiClient::new(config)?, credentials))
    }

    pub fn with_client(client: PickerApiClient, credentials: C) -> Self {
        Self {
            client,
            credentials,
        }
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    /// Returns a usable access token or fails before any request is made.
    async fn access_token(&self) -> PickerResult<String> {
        let bundle = self.credentials.current().await.ok_or_else(|| {
            PickerError::authentication_required("not signed in to Google")
        })?;

        if let Some(reason) = &bundle.error {
            return Err(PickerError::authentication_required(format!(
                "stored credentials are unusable: {}",
                reason
            )));
        }
        Ok(bundle.access_token)
    }

    /// Creates a picker session.
    pub async fn create_session(&self) -> PickerResult<CreatedSession> {
        let token = self.access_token().await?;
        let session = self.client.create_session(&token).await?;
        let created = created_session(session)?;
        info!(
            session_id = %created.session_id,
            poll_interval_ms = created.poll_interval_ms,
            timeout_ms = ?created.timeout_ms,
            "created picker session"
        );
        Ok(created)
    }

    /// Polls a session for completion.
    ///
    /// An upstream precondition failure means the user is still picking and
    /// comes back as a normal not-yet-complete status.
    pub async fn poll_session(&self, session_id: &str) -> PickerResult<SessionStatus> {
        let token = self.access_token().await?;
        match self.client.get_session(&token, session_id).await {
            Ok(session) => {
                debug!(session_id, media_items_set = session.media_items_set, "polled session");
                Ok(SessionStatus {
                    session_id: session.id,
                    media_items_set: session.media_items_set,
                    expire_time: session.expire_time.as_deref().and_then(parse_timestamp),
                })
            }
            Err(e) if e.is_precondition_failure() => {
                debug!(session_id, "selection not yet complete");
                Ok(SessionStatus::pending(session_id))
            }
            Err(e) => Err(e),
        }
    }

    /// Lists one page of the items picked in a session.
    pub async fn list_items(
        &self,
        session_id: &str,
        page_token: Option<&str>,
    ) -> PickerResult<MediaItemPage> {
        let token = self.access_token().await?;
        let page = self
            .client
            .list_media_items(&token, session_id, page_token)
            .await
            .map_err(PickerError::into_not_yet_complete)?;

        Ok(MediaItemPage {
            items: page.media_items.into_iter().map(media_item).collect(),
            next_page_token: page.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    /// Lists every picked item, following page tokens.
    pub async fn list_all_items(&self, session_id: &str) -> PickerResult<Vec<MediaItem>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_items(session_id, page_token.as_deref()).await?;
            items.extend(page.items);
            match page.next_page_token {
                Some(token) if Some(&token) != page_token.as_ref() => page_token = Some(token),
                Some(_) => {
                    warn!(session_id, "page token did not advance, stopping");
                    break;
                }
                None => break,
            }
        }

        debug!(session_id, count = items.len(), "listed picked items");
        Ok(items)
    }

    /// Deletes a session once its items have been read.
    pub async fn delete_session(&self, session_id: &str) -> PickerResult<()> {
        let token = self.access_token().await?;
        self.client.delete_session(&token, session_id).await?;
        info!(session_id, "deleted picker session");
        Ok(())
    }
}

fn created_session(session: ApiSession) -> PickerResult<CreatedSession> {
    let picker_uri = session
        .picker_uri
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| PickerError::invalid_response("session has no pickerUri"))?;

    let polling = session.polling_config.unwrap_or_default();
    let parse = |value: &str| {
        picker_duration_millis(value)
            .map_err(|e| PickerError::invalid_response(format!("bad polling config: {}", e)))
    };
    let poll_interval_ms = match polling.poll_interval.as_deref() {
        Some(value) => parse(value)?,
        None => DEFAULT_POLL_INTERVAL_MS,
    };
    let timeout_ms = polling.timeout_in.as_deref().map(parse).transpose()?;

    Ok(CreatedSession {
        session_id: session.id,
        picker_uri,
        poll_interval_ms,
        timeout_ms,
        expire_time: session.expire_time.as_deref().and_then(parse_timestamp),
    })
}

fn media_item(item: ApiPickedMediaItem) -> MediaItem {
    let file = item.media_file;
    let metadata = file.media_file_metadata.unwrap_or_default();
    MediaItem {
        id: item.id,
        base_url: file.base_url,
        mime_type: file.mime_type,
        filename: file.filename.filter(|f| !f.is_empty()),
        width: metadata.width,
        height: metadata.height,
        create_time: item.create_time.as_deref().and_then(parse_timestamp),
        kind: item
            .kind
            .as_deref()
            .map(MediaKind::from_api)
            .unwrap_or_default(),
    }
}
