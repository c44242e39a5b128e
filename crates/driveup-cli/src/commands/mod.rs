//! CLI subcommands

pub mod auth;
pub mod config;
pub mod upload;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use driveup_core::config::Config;
use driveup_drive::auth::{DriveAuthenticator, OAuth2Config};
use driveup_drive::keyring_store::KeyringTokenStorage;
use driveup_drive::token::TokenManager;

/// Loads and validates the configuration
///
/// A missing file means defaults; a file that exists must parse.
pub(crate) fn load_checked(config_path: &Path) -> Result<Config> {
    let config = if config_path.exists() {
        Config::load(config_path)
            .with_context(|| format!("Failed to parse configuration {}", config_path.display()))?
    } else {
        Config::default()
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let listed: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        anyhow::bail!(
            "Invalid configuration in {}: {}",
            config_path.display(),
            listed.join("; ")
        );
    }
    Ok(config)
}

/// Loads the configuration and checks that OAuth credentials are present
pub(crate) fn load_configured(config_path: &Path) -> Result<Config> {
    let config = load_checked(config_path)?;
    config.credentials().with_context(|| {
        format!(
            "Set auth.client_id and auth.client_secret in {}",
            config_path.display()
        )
    })?;
    Ok(config)
}

/// Builds a token manager that persists refreshed tokens to the keyring
pub(crate) fn token_session(config: &Config) -> Result<(TokenManager, KeyringTokenStorage)> {
    let oauth = OAuth2Config::from_config(config).context("Invalid OAuth configuration")?;
    let storage = KeyringTokenStorage::new(oauth.credentials.client_id());
    let authenticator =
        DriveAuthenticator::new(oauth).context("Failed to set up the OAuth client")?;
    let manager = TokenManager::new(authenticator, Arc::new(storage.clone()));
    Ok((manager, storage))
}
