//! Deadline guard for network calls
//!
//! Every request the pipeline makes goes through [`with_timeout`]. The call and
//! a timer race; whichever settles first wins and the loser is dropped, so no
//! timer outlives the call. A lost race becomes [`DriveError::Timeout`], which
//! names the operation and the deadline so "too slow" is distinguishable from
//! "rejected".

use std::future::Future;
use std::time::Duration;

use driveup_core::config::UploadConfig;
use tracing::warn;

use crate::{DriveError, DriveResult};

/// Default deadline for metadata and control calls
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(15);

/// Default deadline for the upload call
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadlines applied by the Drive client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Folder lookup/creation, permissions, link fetches, token calls
    pub metadata: Duration,
    /// The multipart upload request
    pub upload: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            metadata: METADATA_TIMEOUT,
            upload: UPLOAD_TIMEOUT,
        }
    }
}

impl From<&UploadConfig> for Timeouts {
    fn from(config: &UploadConfig) -> Self {
        Self {
            metadata: Duration::from_secs(config.metadata_timeout_secs),
            upload: Duration::from_secs(config.upload_timeout_secs),
        }
    }
}

/// Runs `call` with a deadline of `duration`
pub async fn with_timeout<T, F>(operation: &str, duration: Duration, call: F) -> DriveResult<T>
where
    F: Future<Output = DriveResult<T>>,
{
    match tokio::time::timeout(duration, call).await {
        Ok(result) => result,
        Err(_elapsed) => {
            warn!(
                operation,
                timeout_secs = duration.as_secs(),
                "Network call exceeded its deadline"
            );
            Err(DriveError::Timeout {
                operation: operation.to_string(),
                duration,
            })
        }
    }
}
