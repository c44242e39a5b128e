//! Google Drive v3 API client
//!
//! Provides a typed HTTP client for the handful of Drive endpoints the upload
//! pipeline needs. Every call is bounded by [`with_timeout`]; the upload call
//! gets the longer deadline.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use driveup_drive::client::DriveClient;
//!
//! # async fn example() -> driveup_drive::DriveResult<()> {
//! let client = DriveClient::new();
//! let links = client.get_file_links("access-token", "file-id").await?;
//! println!("{}", links.web_view_link.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use driveup_core::config::{EndpointsConfig, DEFAULT_API_BASE_URL, DEFAULT_UPLOAD_BASE_URL};
use reqwest::{header::CONTENT_TYPE, Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::multipart::MultipartBody;
use crate::timeout::{with_timeout, Timeouts};
use crate::{DriveError, DriveResult};

/// MIME type Drive uses for folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

const UPLOAD_FIELDS: &str = "id,name,mimeType,webViewLink,webContentLink";
const LINK_FIELDS: &str = "id,webViewLink,webContentLink";

// ============================================================================
// Drive API response types
// ============================================================================

/// File resource as returned by Drive
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
}

/// View and download links of a file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileLinks {
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub web_content_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    #[serde(rename = "webViewLink")]
    web_view_link: Option<String>,
    #[serde(rename = "webContentLink")]
    web_content_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Drive API calls
///
/// Stateless apart from its base URLs and deadlines; the access token is
/// passed per call so a refreshed token takes effect immediately.
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    api_base: String,
    upload_base: String,
    timeouts: Timeouts,
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveClient {
    /// Creates a client for Google's production endpoints
    pub fn new() -> Self {
        Self::with_base_urls(DEFAULT_API_BASE_URL, DEFAULT_UPLOAD_BASE_URL)
    }

    /// Creates a client from the endpoints and deadlines in configuration
    pub fn from_config(endpoints: &EndpointsConfig, timeouts: Timeouts) -> Self {
        Self::with_base_urls(&endpoints.api_base_url, &endpoints.upload_base_url)
            .with_timeouts(timeouts)
    }

    /// Creates a client with custom base URLs (useful for testing)
    ///
    /// # Arguments
    /// * `api_base` - Base for metadata calls, e.g. `https://www.googleapis.com/drive/v3`
    /// * `upload_base` - Base for media uploads, e.g. `https://www.googleapis.com/upload/drive/v3`
    pub fn with_base_urls(api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: trim_base(api_base.into()),
            upload_base: trim_base(upload_base.into()),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    fn request(&self, method: Method, url: &str, access_token: &str) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(access_token)
    }

    /// Lists files matching a Drive search query
    ///
    /// # Arguments
    /// * `query` - A Drive `q` expression; callers are responsible for escaping
    pub async fn search_files(&self, access_token: &str, query: &str) -> DriveResult<Vec<DriveFile>> {
        let url = format!("{}/files", self.api_base);
        debug!(query, "Searching files");

        with_timeout("Folder lookup", self.timeouts.metadata, async {
            let response = self
                .request(Method::GET, &url, access_token)
                .query(&[
                    ("q", query),
                    ("fields", "files(id,name,mimeType)"),
                    ("spaces", "drive"),
                ])
                .send()
                .await?;
            let list: FileListResponse = parse_json(check_status(response).await?).await?;
            Ok(list.files)
        })
        .await
    }

    /// Creates a folder named `name` under `parent_id` and returns its id
    pub async fn create_folder(&self, access_token: &str, name: &str, parent_id: &str) -> DriveResult<String> {
        let url = format!("{}/files", self.api_base);
        debug!(name, parent_id, "Creating folder");

        with_timeout("Folder creation", self.timeouts.metadata, async {
            let response = self
                .request(Method::POST, &url, access_token)
                .query(&[("fields", "id")])
                .json(&json!({
                    "name": name,
                    "mimeType": FOLDER_MIME_TYPE,
                    "parents": [parent_id],
                }))
                .send()
                .await?;
            let file: DriveFile = parse_json(check_status(response).await?).await?;
            Ok(file.id)
        })
        .await
    }

    /// Uploads a prepared multipart body
    ///
    /// Fails with [`DriveError::UploadFailed`] on a non-success status or a
    /// response without a file id.
    pub async fn upload_multipart(&self, access_token: &str, body: MultipartBody) -> DriveResult<DriveFile> {
        let url = format!("{}/files", self.upload_base);
        debug!(bytes = body.len(), "Sending multipart upload");

        with_timeout("File upload", self.timeouts.upload, async {
            let response = self
                .request(Method::POST, &url, access_token)
                .query(&[("uploadType", "multipart"), ("fields", UPLOAD_FIELDS)])
                .header(CONTENT_TYPE, body.content_type())
                .body(body.into_body())
                .send()
                .await?;

            let response = check_status(response).await.map_err(|e| match e {
                DriveError::Api { status, message } => {
                    DriveError::UploadFailed(format!("server returned {}: {}", status, message))
                }
                other => other,
            })?;

            let uploaded: UploadResponse = response.json().await.map_err(|e| {
                DriveError::UploadFailed(format!("unreadable upload response: {}", e))
            })?;

            let id = uploaded
                .id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| DriveError::UploadFailed("response carried no file id".to_string()))?;

            Ok(DriveFile {
                id,
                name: uploaded.name,
                mime_type: uploaded.mime_type,
                web_view_link: uploaded.web_view_link,
                web_content_link: uploaded.web_content_link,
            })
        })
        .await
    }

    /// Grants "anyone with the link" read access to a file
    pub async fn create_public_permission(&self, access_token: &str, file_id: &str) -> DriveResult<()> {
        let url = format!("{}/files/{}/permissions", self.api_base, file_id);
        debug!(file_id, "Granting public read permission");

        with_timeout("Permission update", self.timeouts.metadata, async {
            let response = self
                .request(Method::POST, &url, access_token)
                .json(&json!({ "role": "reader", "type": "anyone" }))
                .send()
                .await?;
            check_status(response).await.map_err(|e| match e {
                DriveError::Api { status, message } => {
                    DriveError::Permission(format!("server returned {}: {}", status, message))
                }
                other => other,
            })?;
            Ok(())
        })
        .await
    }

    /// Fetches the view and download links of a file
    pub async fn get_file_links(&self, access_token: &str, file_id: &str) -> DriveResult<FileLinks> {
        let url = format!("{}/files/{}", self.api_base, file_id);
        debug!(file_id, "Fetching file links");

        with_timeout("Link lookup", self.timeouts.metadata, async {
            let response = self
                .request(Method::GET, &url, access_token)
                .query(&[("fields", LINK_FIELDS)])
                .send()
                .await?;
            parse_json(check_status(response).await?).await
        })
        .await
    }
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}

/// Passes successful responses through; turns anything else into [`DriveError::Api`]
async fn check_status(response: Response) -> DriveResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                text
            }
        });

    Err(DriveError::Api {
        status: status.as_u16(),
        message,
    })
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: Response) -> DriveResult<T> {
    response
        .json()
        .await
        .map_err(|e| DriveError::InvalidResponse(e.to_string()))
}
