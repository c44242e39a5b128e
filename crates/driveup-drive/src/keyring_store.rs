//! Token storage in the system keyring
//!
//! Tokens are serialized as JSON under the service name `driveup`, keyed by
//! the OAuth client id, in the OS credential store (GNOME Keyring, KDE
//! Wallet, macOS Keychain, Windows Credential Manager).

use anyhow::{Context, Result};
use driveup_core::domain::TokenSet;
use driveup_core::ports::TokenPersister;
use tracing::debug;

/// Keyring service name for storing tokens
pub const KEYRING_SERVICE: &str = "driveup";

/// Stores and retrieves OAuth tokens from the system keyring
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    username: String,
}

impl KeyringTokenStorage {
    /// Creates storage for the given keyring username
    ///
    /// # Arguments
    /// * `username` - Keyring account name, normally the OAuth client id
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(KEYRING_SERVICE, &self.username)
            .context("Failed to create keyring entry")
    }

    /// Stores tokens in the system keyring
    pub fn store(&self, tokens: &TokenSet) -> Result<()> {
        let json = serde_json::to_string(tokens).context("Failed to serialize tokens")?;

        self.entry()?
            .set_password(&json)
            .context("Failed to store tokens in keyring")?;

        debug!(username = %self.username, "Stored tokens in keyring");
        Ok(())
    }

    /// Loads tokens from the system keyring
    ///
    /// # Returns
    /// `Some(TokenSet)` if found and valid, `None` if not found
    pub fn load(&self) -> Result<Option<TokenSet>> {
        match self.entry()?.get_password() {
            Ok(json) => {
                let tokens: TokenSet = serde_json::from_str(&json)
                    .context("Failed to deserialize tokens from keyring")?;
                debug!(username = %self.username, "Loaded tokens from keyring");
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(username = %self.username, "No tokens found in keyring");
                Ok(None)
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    /// Removes tokens from the system keyring
    ///
    /// Succeeds if there was nothing to remove.
    pub fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                debug!(username = %self.username, "Cleared tokens from keyring");
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to delete keyring entry")),
        }
    }
}

#[async_trait::async_trait]
impl TokenPersister for KeyringTokenStorage {
    async fn persist(&self, tokens: &TokenSet) -> Result<()> {
        let storage = self.clone();
        let tokens = tokens.clone();
        // Keyring backends block on D-Bus or the OS credential API
        tokio::task::spawn_blocking(move || storage.store(&tokens))
            .await
            .context("Keyring task panicked")?
    }
}
