//! Domain types
//!
//! - OAuth credentials, token sets and the derived authentication state
//! - Upload requests, progress events and results
//! - Domain-specific error types

pub mod errors;
pub mod tokens;
pub mod upload;

// Re-export commonly used types
pub use errors::DomainError;
pub use tokens::{expiry_margin, is_expired_at, AuthState, Credentials, TokenSet};
pub use upload::{FileSource, UploadProgress, UploadRequest, UploadResult, UploadStage};
