//! Upload request, progress and result types
//!
//! One [`UploadRequest`] produces a sequence of [`UploadProgress`] events and,
//! on success, exactly one [`UploadResult`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Stage of an upload as reported to the progress subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadStage {
    Preparing,
    Uploading,
    SettingPermission,
    Complete,
    Error,
}

impl UploadStage {
    /// Progress percentage reported when the stage begins
    ///
    /// `Error` carries no fixed value; the event reuses 0.
    pub fn percent(&self) -> u8 {
        match self {
            UploadStage::Preparing => 10,
            UploadStage::Uploading => 30,
            UploadStage::SettingPermission => 70,
            UploadStage::Complete => 100,
            UploadStage::Error => 0,
        }
    }

    /// Returns true for stages after which no further events are emitted
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStage::Complete | UploadStage::Error)
    }
}

impl std::fmt::Display for UploadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadStage::Preparing => write!(f, "preparing"),
            UploadStage::Uploading => write!(f, "uploading"),
            UploadStage::SettingPermission => write!(f, "setting-permission"),
            UploadStage::Complete => write!(f, "complete"),
            UploadStage::Error => write!(f, "error"),
        }
    }
}

/// A single progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub stage: UploadStage,
    pub message: String,
    /// Percentage in 0..=100
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadProgress {
    /// Creates an event for a non-error stage using the stage's percentage
    pub fn stage(stage: UploadStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            progress: stage.percent(),
            error: None,
        }
    }

    /// Creates an event with an explicit percentage
    pub fn with_progress(
        stage: UploadStage,
        message: impl Into<String>,
        progress: u8,
    ) -> Result<Self, DomainError> {
        if progress > 100 {
            return Err(DomainError::InvalidProgress(progress));
        }
        Ok(Self {
            stage,
            message: message.into(),
            progress,
            error: None,
        })
    }

    /// Creates the terminal error event
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stage: UploadStage::Error,
            message: format!("Upload failed: {}", message),
            progress: UploadStage::Error.percent(),
            error: Some(message),
        }
    }
}

/// Where the bytes of an upload come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Read from disk when the upload starts
    Path(PathBuf),
    /// Already in memory
    Bytes(Vec<u8>),
}

/// A request to upload one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    file_name: String,
    mime_type: Option<String>,
    source: FileSource,
}

impl UploadRequest {
    /// Creates a request; the file name must be non-empty and contain no `/`
    pub fn new(file_name: impl Into<String>, source: FileSource) -> Result<Self, DomainError> {
        let file_name = file_name.into();
        if file_name.trim().is_empty() || file_name.contains('/') {
            return Err(DomainError::InvalidFileName(file_name));
        }
        Ok(Self {
            file_name,
            mime_type: None,
            source,
        })
    }

    /// Creates a request for a file on disk, naming it after the path's last component
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self, DomainError> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DomainError::InvalidFileName(path.display().to_string()))?;
        Self::new(name, FileSource::Path(path))
    }

    /// Overrides the media type instead of guessing it from the name
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn source(&self) -> &FileSource {
        &self.source
    }
}

/// Outcome of a successful upload
///
/// Produced once per upload and handed to the caller; the pipeline keeps no
/// reference to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub remote_file_id: String,
    pub view_link: String,
    pub download_link: String,
    pub file_name: String,
    pub mime_type: String,
}
