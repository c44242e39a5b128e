//! Auth commands - Login, Logout, and Status for Google Drive authorization
//!
//! Provides the `driveup auth` CLI subcommands which:
//! 1. `login`  - Runs the OAuth2 authorization-code flow in the browser and
//!    stores the tokens in the system keyring.
//! 2. `logout` - Clears tokens from the keyring.
//! 3. `status` - Shows whether the stored token is fresh, stale or missing.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use driveup_core::domain::{expiry_margin, AuthState};
use tracing::info;

use super::{load_configured, token_session};
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Authorize driveup with Google Drive via OAuth2
    Login,
    /// Remove stored credentials
    Logout,
    /// Check authentication status
    Status,
}

impl AuthCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let fmt = get_formatter(format == OutputFormat::Json);
        match self {
            AuthCommand::Login => self.execute_login(&*fmt, config_path).await,
            AuthCommand::Logout => self.execute_logout(&*fmt, config_path).await,
            AuthCommand::Status => self.execute_status(&*fmt, format, config_path).await,
        }
    }

    /// Execute the login flow:
    /// 1. Load credentials from config
    /// 2. Run the authorization-code flow through the browser
    /// 3. Store tokens in the keyring
    async fn execute_login(&self, fmt: &dyn OutputFormatter, config_path: &Path) -> Result<()> {
        let config = load_configured(config_path)?;
        let (manager, _storage) = token_session(&config)?;

        info!(
            redirect_port = config.auth.redirect_port,
            "Starting OAuth2 login"
        );
        fmt.info("Opening browser for Google sign-in...");
        fmt.info(&format!(
            "Waiting up to {}s for the browser to redirect back",
            config.auth.authorization_timeout_secs
        ));

        let tokens = manager.authorize().await.context("OAuth2 login failed")?;

        fmt.success("Authorized with Google Drive");
        fmt.info(&format!(
            "Access token valid until {}",
            tokens.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        if tokens.refresh_token.is_none() {
            fmt.warn("No refresh token was issued; you will need to log in again when it expires");
        }

        Ok(())
    }

    async fn execute_logout(&self, fmt: &dyn OutputFormatter, config_path: &Path) -> Result<()> {
        let config = load_configured(config_path)?;
        let (_manager, storage) = token_session(&config)?;

        storage
            .clear()
            .context("Failed to clear tokens from keyring")?;

        info!("Logged out");
        fmt.success("Logged out successfully");
        fmt.info("Credentials removed from keyring");
        Ok(())
    }

    async fn execute_status(
        &self,
        fmt: &dyn OutputFormatter,
        format: OutputFormat,
        config_path: &Path,
    ) -> Result<()> {
        let config = load_configured(config_path)?;
        let (_manager, storage) = token_session(&config)?;

        let tokens = storage.load().context("Failed to read tokens from keyring")?;
        let margin = expiry_margin(Duration::from_secs(config.auth.expiry_margin_secs));
        let state = AuthState::of(tokens.as_ref(), Utc::now(), margin);

        if matches!(format, OutputFormat::Json) {
            let json = serde_json::json!({
                "authenticated": state.is_authenticated(),
                "state": state,
                "expires_at": tokens.as_ref().map(|t| t.expires_at.to_rfc3339()),
                "has_refresh_token": tokens.as_ref().map(|t| t.refresh_token.is_some()).unwrap_or(false),
            });
            fmt.print_json(&json);
            return Ok(());
        }

        match (state, tokens) {
            (AuthState::Unauthenticated, _) | (_, None) => {
                fmt.info("Authentication status: Not authorized");
                fmt.info("Run 'driveup auth login' to authorize");
            }
            (state, Some(tokens)) => {
                fmt.success(&format!("Authentication status: {}", state));
                fmt.info(&format!(
                    "Expires:       {}",
                    tokens.expires_at.format("%Y-%m-%d %H:%M:%S UTC")
                ));
                fmt.info(&format!(
                    "Refresh token: {}",
                    if tokens.refresh_token.is_some() { "stored" } else { "missing" }
                ));
                if state == AuthState::Stale {
                    fmt.info("The access token will be refreshed on the next upload");
                }
            }
        }

        Ok(())
    }
}
