//! Domain error types
//!
//! Errors raised when constructing or validating domain values, before any
//! network call is attempted.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// File name is empty or contains a path separator
    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    /// Progress percentage outside 0..=100
    #[error("Invalid progress value: {0}")]
    InvalidProgress(u8),

    /// OAuth client credentials are missing or empty
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
