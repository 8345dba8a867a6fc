//! Google Drive gateway
//!
//! [`StorageGateway`] over the Drive v3 REST API. Responses are decoded into
//! [`Node`] records here; anything that does not have the expected shape is a
//! [`GatewayError::MalformedResponse`].

use crate::error::{ApiError, GatewayError};
use crate::gateway::StorageGateway;
use crate::tree::{Node, NodeKind};
use crate::types::{NodeId, FOLDER_MIME_TYPE};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const NODE_FIELDS: &str = "id,name,mimeType,parents";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType,parents)";
const PAGE_SIZE: &str = "1000";

/// Drive API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: Option<String>,
    name: Option<String>,
    mime_type: Option<String>,
    #[serde(default)]
    parents: Vec<String>,
}

impl DriveFile {
    /// Decode into a node. `listed_in` is the folder whose listing returned this file.
    fn into_node(self, listed_in: Option<&str>) -> Result<Node, GatewayError> {
        let id = self
            .id
            .ok_or_else(|| GatewayError::MalformedResponse("file without id".to_string()))?;
        let name = self.name.ok_or_else(|| {
            GatewayError::MalformedResponse(format!("file {} without name", id))
        })?;
        let mime_type = self.mime_type.ok_or_else(|| {
            GatewayError::MalformedResponse(format!("file {} without mimeType", id))
        })?;

        // Legacy multi-parent items: prefer the folder being listed.
        let parent_id = match listed_in {
            Some(folder) if self.parents.iter().any(|p| p == folder) => Some(folder.to_string()),
            _ => self.parents.into_iter().next(),
        };

        Ok(Node {
            id,
            name,
            kind: NodeKind::from_mime_type(&mime_type),
            parent_id,
            mime_type: Some(mime_type),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Authenticated account, as reported by `about`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUser {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email_address: String,
}

#[derive(Debug, Deserialize)]
struct About {
    user: Option<DriveUser>,
}

/// Map a non-success HTTP status (and its error body) onto the gateway taxonomy.
pub fn classify_status(status: u16, body: &str, retry_after: Option<Duration>) -> GatewayError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP {}", status));
    let rate_limit_reason = parsed.as_ref().is_some_and(|e| {
        e.error
            .errors
            .iter()
            .any(|d| d.reason == "rateLimitExceeded" || d.reason == "userRateLimitExceeded")
    });

    match status {
        404 => GatewayError::NotFound(message),
        401 => GatewayError::PermissionDenied(message),
        403 if rate_limit_reason => GatewayError::RateLimited {
            message,
            retry_after,
        },
        403 => GatewayError::PermissionDenied(message),
        429 => GatewayError::RateLimited {
            message,
            retry_after,
        },
        408 | 500..=599 => GatewayError::Transient(message),
        _ => GatewayError::MalformedResponse(format!("unexpected status {}: {}", status, message)),
    }
}

fn classify_transport(err: reqwest::Error) -> GatewayError {
    if err.is_decode() {
        GatewayError::MalformedResponse(err.to_string())
    } else {
        GatewayError::Transient(err.to_string())
    }
}

/// Escape a value for use inside a single-quoted Drive search literal.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Drive v3 client bound to one access token
pub struct DriveGateway {
    client: Client,
    base: Url,
    access_token: String,
}

impl DriveGateway {
    pub fn new(config: &DriveConfig, access_token: impl Into<String>) -> Result<Self, ApiError> {
        let base = Url::parse(&config.api_base).map_err(|e| {
            ApiError::ConfigError(format!("Invalid drive.api_base '{}': {}", config.api_base, e))
        })?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::ConfigError(format!(
                "drive.api_base must be an http(s) URL, got '{}'",
                config.api_base
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base,
            access_token: access_token.into(),
        })
    }

    /// API base joined with `segments`, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(classify_transport)?;
        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await.map_err(classify_transport)?;
            return serde_json::from_slice(&body)
                .map_err(|e| GatewayError::MalformedResponse(e.to_string()));
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        let err = classify_status(status.as_u16(), &body, retry_after);
        warn!(status = status.as_u16(), error = %err, "Drive request failed");
        Err(err)
    }

    /// The account the access token belongs to.
    pub async fn about(&self) -> Result<DriveUser, GatewayError> {
        let about: About = self
            .send(
                self.client
                    .get(self.endpoint(&["about"]))
                    .query(&[("fields", "user")]),
            )
            .await?;
        about
            .user
            .ok_or_else(|| GatewayError::MalformedResponse("about without user".to_string()))
    }
}

#[async_trait]
impl StorageGateway for DriveGateway {
    async fn get_metadata(&self, id: &str) -> Result<Node, GatewayError> {
        let file: DriveFile = self
            .send(
                self.client
                    .get(self.endpoint(&["files", id]))
                    .query(&[("fields", NODE_FIELDS), ("supportsAllDrives", "true")]),
            )
            .await?;
        file.into_node(None)
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<Node>, GatewayError> {
        let query = format!(
            "'{}' in parents and trashed=false",
            escape_query_literal(folder_id)
        );
        let mut nodes = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut request = self.client.get(self.endpoint(&["files"])).query(&[
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("orderBy", "folder,name"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
                ("pageSize", PAGE_SIZE),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: FileList = self.send(request).await?;
            pages += 1;
            for file in page.files {
                nodes.push(file.into_node(Some(folder_id))?);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(folder_id = %folder_id, pages, children = nodes.len(), "Listed Drive folder");
        Ok(nodes)
    }

    async fn create_folder(&self, name: &str, parent_id: &str) -> Result<NodeId, GatewayError> {
        let body = serde_json::json!({
            "name": name,
            "mimeType": FOLDER_MIME_TYPE,
            "parents": [parent_id],
        });
        let created: CreatedFile = self
            .send(
                self.client
                    .post(self.endpoint(&["files"]))
                    .query(&[("supportsAllDrives", "true"), ("fields", "id")])
                    .json(&body),
            )
            .await?;
        Ok(created.id)
    }

    async fn copy_file(
        &self,
        source_id: &str,
        new_name: &str,
        parent_id: &str,
    ) -> Result<NodeId, GatewayError> {
        let body = serde_json::json!({
            "name": new_name,
            "parents": [parent_id],
        });
        let created: CreatedFile = self
            .send(
                self.client
                    .post(self.endpoint(&["files", source_id, "copy"]))
                    .query(&[("supportsAllDrives", "true"), ("fields", "id")])
                    .json(&body),
            )
            .await?;
        Ok(created.id)
    }
}
