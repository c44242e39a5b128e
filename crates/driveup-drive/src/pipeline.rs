//! End-to-end upload
//!
//! [`UploadPipeline::upload_file`] runs one upload as a sequential chain of
//! network calls and reports its progress:
//!
//! ```text
//! preparing (10)           access token (refresh + persist if stale), folder resolution, encoding
//! uploading (30)           multipart POST to the upload endpoint
//! setting-permission (70)  public read permission, link lookup
//! complete (100)           result delivered
//! ```
//!
//! Any failure before a file id is known ends in a single `error` event and
//! `None`. Permission and link failures after that point are absorbed.

use std::borrow::Cow;
use std::sync::Arc;

use driveup_core::config::Config;
use driveup_core::domain::{FileSource, UploadProgress, UploadRequest, UploadResult, UploadStage};
use tracing::{error, info, warn};

use crate::client::{DriveClient, DriveFile};
use crate::folders::FolderResolver;
use crate::multipart::MultipartBody;
use crate::timeout::Timeouts;
use crate::token::TokenManager;
use crate::DriveResult;

/// Folder used by [`UploadPipeline::upload_to_default`] unless configured otherwise
pub const DEFAULT_FOLDER: &str = "driveup";

/// Progress subscriber invoked synchronously for every event
pub type ProgressCallback<'a> = &'a (dyn Fn(UploadProgress) + Send + Sync);

/// View link used when the link lookup fails
pub fn fallback_view_link(file_id: &str) -> String {
    format!("https://drive.google.com/file/d/{}/view", file_id)
}

/// Download link used when the link lookup fails
pub fn fallback_download_link(file_id: &str) -> String {
    format!("https://drive.google.com/uc?export=download&id={}", file_id)
}

/// Uploads files to Drive and reports staged progress
///
/// Shares the token manager with other pipelines; owns its folder cache.
pub struct UploadPipeline {
    tokens: Arc<TokenManager>,
    client: DriveClient,
    folders: FolderResolver,
    default_folder: String,
}

impl UploadPipeline {
    pub fn new(tokens: Arc<TokenManager>, client: DriveClient) -> Self {
        Self {
            tokens,
            folders: FolderResolver::new(client.clone()),
            client,
            default_folder: DEFAULT_FOLDER.to_string(),
        }
    }

    /// Builds a pipeline using the endpoints, deadlines and default folder in `config`
    pub fn from_config(config: &Config, tokens: Arc<TokenManager>) -> Self {
        let client = DriveClient::from_config(&config.endpoints, Timeouts::from(&config.upload));
        Self::new(tokens, client).with_default_folder(config.upload.default_folder.clone())
    }

    pub fn with_default_folder(mut self, folder: impl Into<String>) -> Self {
        self.default_folder = folder.into();
        self
    }

    /// Folder path used by [`UploadPipeline::upload_to_default`]
    pub fn default_folder(&self) -> &str {
        &self.default_folder
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    pub fn folders(&self) -> &FolderResolver {
        &self.folders
    }

    /// Uploads `request` into the folder at `folder_path`
    ///
    /// Returns `None` on failure, after exactly one `error` event. Never
    /// returns a partially populated result.
    pub async fn upload_file(
        &self,
        request: &UploadRequest,
        folder_path: &str,
        on_progress: ProgressCallback<'_>,
    ) -> Option<UploadResult> {
        match self.try_upload(request, folder_path, on_progress).await {
            Ok(result) => Some(result),
            Err(e) => {
                error!(file = request.file_name(), folder = folder_path, error = %e, "Upload failed");
                on_progress(UploadProgress::error(e.to_string()));
                None
            }
        }
    }

    /// Uploads `request` into the configured default folder
    pub async fn upload_to_default(
        &self,
        request: &UploadRequest,
        on_progress: ProgressCallback<'_>,
    ) -> Option<UploadResult> {
        self.upload_file(request, &self.default_folder, on_progress)
            .await
    }

    async fn try_upload(
        &self,
        request: &UploadRequest,
        folder_path: &str,
        on_progress: ProgressCallback<'_>,
    ) -> DriveResult<UploadResult> {
        on_progress(UploadProgress::stage(UploadStage::Preparing, "Preparing upload..."));

        let access_token = self.tokens.access_token().await?;
        let folder_id = self.folders.ensure_folder(&access_token, folder_path).await?;

        let data: Cow<'_, [u8]> = match request.source() {
            FileSource::Path(path) => Cow::Owned(tokio::fs::read(path).await?),
            FileSource::Bytes(bytes) => Cow::Borrowed(bytes.as_slice()),
        };
        let mime_type = resolve_mime_type(request);
        let body = MultipartBody::build(request.file_name(), &mime_type, &folder_id, &data)?;
        drop(data);

        on_progress(UploadProgress::stage(
            UploadStage::Uploading,
            format!("Uploading {}...", request.file_name()),
        ));

        let uploaded = self.client.upload_multipart(&access_token, body).await?;
        info!(file_id = %uploaded.id, folder_id = %folder_id, "File uploaded");

        on_progress(UploadProgress::stage(
            UploadStage::SettingPermission,
            "Setting permissions...",
        ));

        if let Err(e) = self
            .client
            .create_public_permission(&access_token, &uploaded.id)
            .await
        {
            warn!(file_id = %uploaded.id, error = %e, "Could not make file public; it stays private");
        }

        let (view_link, download_link) = self.resolve_links(&access_token, &uploaded).await;

        let result = UploadResult {
            remote_file_id: uploaded.id.clone(),
            view_link,
            download_link,
            file_name: uploaded
                .name
                .clone()
                .unwrap_or_else(|| request.file_name().to_string()),
            mime_type: uploaded.mime_type.clone().unwrap_or(mime_type),
        };

        on_progress(UploadProgress::stage(UploadStage::Complete, "Upload complete"));
        Ok(result)
    }

    /// Fetched links first, then links from the upload response, then the templates
    async fn resolve_links(&self, access_token: &str, uploaded: &DriveFile) -> (String, String) {
        let fetched = match self.client.get_file_links(access_token, &uploaded.id).await {
            Ok(links) => Some(links),
            Err(e) => {
                warn!(file_id = %uploaded.id, error = %e, "Link lookup failed, using fallback links");
                None
            }
        };

        let view = fetched
            .as_ref()
            .and_then(|l| l.web_view_link.clone())
            .or_else(|| uploaded.web_view_link.clone())
            .unwrap_or_else(|| fallback_view_link(&uploaded.id));
        let download = fetched
            .as_ref()
            .and_then(|l| l.web_content_link.clone())
            .or_else(|| uploaded.web_content_link.clone())
            .unwrap_or_else(|| fallback_download_link(&uploaded.id));

        (view, download)
    }
}

/// Explicit media type, else a guess from the file name, else `application/octet-stream`
fn resolve_mime_type(request: &UploadRequest) -> String {
    match request.mime_type() {
        Some(mime) => mime.to_string(),
        None => mime_guess::from_path(request.file_name())
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}
