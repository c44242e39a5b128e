//! driveup drive - Google Drive adapter
//!
//! Provides the authentication-and-upload pipeline:
//! - OAuth2 authorization-code flow with a local redirect listener
//! - Token lifecycle with proactive, single-flight refresh
//! - Folder-path resolution with an in-memory cache
//! - Multipart upload with staged progress reporting
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 authorization and refresh against the token endpoint
//! - [`callback`] - Local HTTP listener for the OAuth redirect
//! - [`token`] - Shared token state and refresh-then-persist
//! - [`client`] - Drive v3 HTTP client
//! - [`timeout`] - Deadline wrapper for every network call
//! - [`folders`] - Slash-delimited path to folder id resolution
//! - [`multipart`] - `multipart/related` payload construction
//! - [`pipeline`] - End-to-end upload with progress events
//! - [`keyring_store`] - Token storage in the system keyring

pub mod auth;
pub mod callback;
pub mod client;
pub mod folders;
pub mod keyring_store;
pub mod multipart;
pub mod pipeline;
pub mod timeout;
pub mod token;

use std::time::Duration;

use driveup_core::domain::DomainError;
use thiserror::Error;

/// Errors that can occur while authenticating with or uploading to Drive
#[derive(Debug, Error)]
pub enum DriveError {
    /// Interactive authorization failed or was cancelled; re-run authorization
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// The refresh token was rejected; the session must be re-authorized
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// The token endpoint could not be reached; stored tokens stay valid for a retry
    #[error("Token endpoint unreachable: {0}")]
    TokenEndpoint(String),

    /// A network call exceeded its deadline
    #[error("{operation} timed out after {}s", duration.as_secs())]
    Timeout {
        /// Short description of the call that timed out
        operation: String,
        /// The deadline that was exceeded
        duration: Duration,
    },

    /// The upload endpoint rejected the file or returned an unusable response
    #[error("Upload rejected: {0}")]
    UploadFailed(String),

    /// Assigning the public permission failed (non-fatal for uploads)
    #[error("Permission update failed: {0}")]
    Permission(String),

    /// The API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the response body
        message: String,
    },

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Reading the local file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A domain value was invalid
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl DriveError {
    /// Returns true if retrying later (with backoff) may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DriveError::Timeout { .. } | DriveError::TokenEndpoint(_) => true,
            DriveError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the caller must run interactive authorization again
    pub fn requires_reauthorization(&self) -> bool {
        matches!(self, DriveError::Authorization(_) | DriveError::Refresh(_))
    }
}

/// Result alias for Drive operations
pub type DriveResult<T> = Result<T, DriveError>;
