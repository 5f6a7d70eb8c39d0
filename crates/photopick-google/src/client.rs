//! Google Photos Picker API client.
//!
//! Low-level HTTP access to the four picker endpoints. Every call takes the
//! bearer token explicitly; credential handling lives in
//! [`PickerSessions`](crate::session::PickerSessions).

use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::PickerConfig;
use crate::error::{PickerError, PickerResult};

/// Picker API client.
#[derive(Debug, Clone)]
pub struct PickerApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PickerApiClient {
    pub fn new(config: &PickerConfig) -> PickerResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                PickerError::internal("failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            http_client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(access_token)
    }

    /// `POST /v1/sessions`
    pub async fn create_session(&self, access_token: &str) -> PickerResult<ApiSession> {
        let request = self
            .request(Method::POST, "/v1/sessions", access_token)
            .json(&serde_json::json!({}));
        parse_json(send(request).await?).await
    }

    /// `GET /v1/sessions/{id}`
    pub async fn get_session(&self, access_token: &str, session_id: &str) -> PickerResult<ApiSession> {
        let path = format!("/v1/sessions/{}", urlencoding::encode(session_id));
        let request = self.request(Method::GET, &path, access_token);
        parse_json(send(request).await?).await
    }

    /// `GET /v1/mediaItems?sessionId=..&pageToken=..`
    pub async fn list_media_items(
        &self,
        access_token: &str,
        session_id: &str,
        page_token: Option<&str>,
    ) -> PickerResult<ApiMediaItemsPage> {
        let mut request = self
            .request(Method::GET, "/v1/mediaItems", access_token)
            .query(&[("sessionId", session_id)]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        parse_json(send(request).await?).await
    }

    /// `DELETE /v1/sessions/{id}`
    pub async fn delete_session(&self, access_token: &str, session_id: &str) -> PickerResult<()> {
        let path = format!("/v1/sessions/{}", urlencoding::encode(session_id));
        let request = self.request(Method::DELETE, &path, access_token);
        send(request).await?;
        Ok(())
    }
}

/// Sends a request, turning transport failures and non-success statuses into
/// classified errors.
async fn send(request: RequestBuilder) -> PickerResult<Response> {
    let response = request.send().await.map_err(|e| {
        let message = if e.is_timeout() {
            "request timeout".to_string()
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            format!("request failed: {}", e)
        };
        PickerError::network(message).with_source(e)
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    debug!(status = status.as_u16(), body = %body, "picker API error response");
    let (upstream_status, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) if !parsed.error.message.is_empty() => {
            (parsed.error.status, parsed.error.message)
        }
        Ok(parsed) => (parsed.error.status, format!("API error ({})", status)),
        Err(_) if body.trim().is_empty() => (None, format!("API error ({})", status)),
        Err(_) => (None, format!("API error ({}): {}", status, body.trim())),
    };

    Err(PickerError::from_http_status(
        status.as_u16(),
        upstream_status.as_deref(),
        message,
    ))
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> PickerResult<T> {
    let body = response
        .text()
        .await
        .map_err(|e| PickerError::network(format!("failed to read response: {}", e)))?;
    serde_json::from_str(&body).map_err(|e| {
        PickerError::invalid_response(format!("failed to parse response: {}", e))
    })
}

/// A picker session as returned by create and get.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSession {
    pub id: String,
    #[serde(default)]
    pub picker_uri: Option<String>,
    #[serde(default)]
    pub polling_config: Option<ApiPollingConfig>,
    #[serde(default)]
    pub media_items_set: bool,
    #[serde(default)]
    pub expire_time: Option<String>,
}

/// Polling hints; both values are duration strings such as `"5s"`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPollingConfig {
    #[serde(default)]
    pub poll_interval: Option<String>,
    #[serde(default)]
    pub timeout_in: Option<String>,
}

/// One page of picked media items.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMediaItemsPage {
    #[serde(default)]
    pub media_items: Vec<ApiPickedMediaItem>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPickedMediaItem {
    pub id: String,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub media_file: ApiMediaFile,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMediaFile {
    pub base_url: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub media_file_metadata: Option<ApiMediaFileMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiMediaFileMetadata {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Google's standard error envelope.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}
