//! Shared token state
//!
//! [`TokenManager`] owns the current [`TokenSet`] and hands out access tokens.
//! A stale token is refreshed lazily on read. The lock is held across the
//! refresh and the persistence call, so concurrent callers wait for the
//! in-flight refresh instead of issuing their own, and a refreshed token is
//! never used before the persister has stored it.

use std::sync::Arc;

use chrono::Utc;
use driveup_core::domain::{expiry_margin, AuthState, TokenSet};
use driveup_core::ports::TokenPersister;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::DriveAuthenticator;
use crate::{DriveError, DriveResult};

/// Holds the session's tokens and refreshes them on demand
pub struct TokenManager {
    authenticator: DriveAuthenticator,
    persister: Arc<dyn TokenPersister>,
    tokens: Mutex<Option<TokenSet>>,
}

impl TokenManager {
    /// Creates a manager with no tokens (unauthenticated)
    pub fn new(authenticator: DriveAuthenticator, persister: Arc<dyn TokenPersister>) -> Self {
        Self {
            authenticator,
            persister,
            tokens: Mutex::new(None),
        }
    }

    /// Seeds the manager with previously stored tokens
    pub fn with_tokens(mut self, tokens: TokenSet) -> Self {
        self.tokens = Mutex::new(Some(tokens));
        self
    }

    pub fn authenticator(&self) -> &DriveAuthenticator {
        &self.authenticator
    }

    /// Replaces the current tokens without persisting them
    pub async fn set_tokens(&self, tokens: TokenSet) {
        *self.tokens.lock().await = Some(tokens);
    }

    /// Returns a copy of the current tokens
    pub async fn current(&self) -> Option<TokenSet> {
        self.tokens.lock().await.clone()
    }

    /// Forgets the current tokens
    pub async fn clear(&self) {
        *self.tokens.lock().await = None;
    }

    /// Reports whether the session is unauthenticated, fresh or stale
    pub async fn state(&self) -> AuthState {
        let guard = self.tokens.lock().await;
        AuthState::of(guard.as_ref(), Utc::now(), self.margin())
    }

    /// Runs interactive authorization and stores the result
    ///
    /// The new tokens are persisted before they become current.
    pub async fn authorize(&self) -> DriveResult<TokenSet> {
        let tokens = self.authenticator.start_authorization().await?;
        self.adopt(tokens).await
    }

    /// Stores tokens obtained elsewhere, persisting them first
    pub async fn adopt(&self, tokens: TokenSet) -> DriveResult<TokenSet> {
        let mut guard = self.tokens.lock().await;
        self.persist(&tokens).await;
        *guard = Some(tokens.clone());
        Ok(tokens)
    }

    /// Returns an access token that is valid beyond the safety margin
    ///
    /// Refreshes first if the current token is stale. A rejected refresh
    /// token drops the session back to unauthenticated and yields
    /// [`DriveError::Refresh`]. Timeouts and an unreachable token endpoint
    /// keep the stale tokens so a later call can retry.
    pub async fn access_token(&self) -> DriveResult<String> {
        let mut guard = self.tokens.lock().await;

        let current = match (AuthState::of(guard.as_ref(), Utc::now(), self.margin()), guard.as_ref()) {
            (AuthState::Fresh, Some(current)) => {
                debug!("Access token is fresh");
                return Ok(current.access_token.clone());
            }
            (AuthState::Stale, Some(current)) => current,
            _ => {
                return Err(DriveError::Authorization(
                    "Not authenticated; run authorization first".to_string(),
                ))
            }
        };

        let Some(refresh_token) = current.refresh_token.clone() else {
            warn!("Access token is stale and no refresh token is stored");
            *guard = None;
            return Err(DriveError::Refresh(
                "No refresh token available; re-run authorization".to_string(),
            ));
        };

        info!("Access token is stale, refreshing");
        match self.authenticator.refresh_access_token(&refresh_token).await {
            Ok(tokens) => {
                self.persist(&tokens).await;
                let access_token = tokens.access_token.clone();
                *guard = Some(tokens);
                Ok(access_token)
            }
            Err(DriveError::Refresh(message)) => {
                warn!(error = %message, "Refresh token rejected, session is now unauthenticated");
                *guard = None;
                Err(DriveError::Refresh(message))
            }
            Err(e) => {
                warn!(error = %e, "Refresh did not complete, keeping stored tokens");
                Err(e)
            }
        }
    }

    async fn persist(&self, tokens: &TokenSet) {
        if let Err(e) = self.persister.persist(tokens).await {
            warn!(error = %e, "Failed to persist refreshed tokens");
        }
    }

    fn margin(&self) -> chrono::Duration {
        expiry_margin(self.authenticator.expiry_margin())
    }
}
