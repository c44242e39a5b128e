//! Upload command - Send one file to a Drive folder
//!
//! Loads the stored tokens, runs the upload pipeline, and prints each
//! progress event followed by the view and download links.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use driveup_core::domain::UploadRequest;
use driveup_drive::pipeline::UploadPipeline;
use tracing::info;

use super::{load_configured, token_session};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// File to upload
    pub(crate) file: PathBuf,

    /// Destination folder path, e.g. "notes/images" (defaults to upload.default_folder)
    #[arg(long)]
    pub(crate) folder: Option<String>,

    /// Media type; guessed from the file name when omitted
    #[arg(long)]
    pub(crate) mime: Option<String>,
}

impl UploadCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let fmt = get_formatter(matches!(format, OutputFormat::Json));

        let config = load_configured(config_path)?;
        let (manager, storage) = token_session(&config)?;

        let tokens = storage
            .load()
            .context("Failed to read tokens from keyring")?
            .context("Not authorized. Run 'driveup auth login' first")?;

        let pipeline = UploadPipeline::from_config(&config, Arc::new(manager.with_tokens(tokens)));

        let mut request = UploadRequest::from_path(&self.file)
            .with_context(|| format!("Cannot upload {}", self.file.display()))?;
        if let Some(mime) = &self.mime {
            request = request.with_mime_type(mime);
        }

        let folder = self
            .folder
            .clone()
            .unwrap_or_else(|| pipeline.default_folder().to_string());

        info!(file = %self.file.display(), folder = %folder, "Uploading");

        let result = pipeline
            .upload_file(&request, &folder, &|event| fmt.progress(&event))
            .await;

        let Some(result) = result else {
            anyhow::bail!("Upload of {} did not complete", self.file.display());
        };

        if matches!(format, OutputFormat::Json) {
            let json = serde_json::to_value(&result).context("Failed to serialize upload result")?;
            fmt.print_json(&json);
        } else {
            fmt.success(&format!("Uploaded {} to /{}", result.file_name, folder.trim_matches('/')));
            fmt.info(&format!("File ID:  {}", result.remote_file_id));
            fmt.info(&format!("View:     {}", result.view_link));
            fmt.info(&format!("Download: {}", result.download_link));
        }

        Ok(())
    }
}
