//! Token persistence port (driven/secondary port)
//!
//! The settings layer owns the stored tokens. The upload pipeline never writes
//! them directly; after a successful refresh it awaits
//! [`TokenPersister::persist`] before the new access token is used, so a
//! refreshed token cannot be lost if the process exits right afterwards.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage failures are adapter-specific.
//! - Uses `#[async_trait]` so implementations may await I/O.

use crate::domain::TokenSet;

#[async_trait::async_trait]
pub trait TokenPersister: Send + Sync {
    /// Stores a freshly minted token set
    async fn persist(&self, tokens: &TokenSet) -> anyhow::Result<()>;
}

/// Persister that discards tokens, for callers with nowhere to store them
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTokenPersister;

#[async_trait::async_trait]
impl TokenPersister for NoopTokenPersister {
    async fn persist(&self, _tokens: &TokenSet) -> anyhow::Result<()> {
        Ok(())
    }
}
