//! OAuth credentials and token state
//!
//! [`Credentials`] are fixed for the lifetime of an authenticator.
//! [`TokenSet`] is replaced on every refresh and written through the
//! [`TokenPersister`](crate::ports::TokenPersister) port.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Fallback lifetime when the token endpoint omits `expires_in`
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// Converts a configured safety margin to a chrono duration
///
/// Margins too large to represent saturate, so every token counts as stale.
pub fn expiry_margin(margin: std::time::Duration) -> Duration {
    Duration::from_std(margin).unwrap_or(Duration::MAX)
}

/// Returns true when `now` is within `margin` of `expires_at` (or past it)
pub fn is_expired_at(expires_at: DateTime<Utc>, now: DateTime<Utc>, margin: Duration) -> bool {
    expires_at
        .checked_sub_signed(margin)
        .map_or(true, |stale_from| now >= stale_from)
}

/// Absolute expiry `expires_in` seconds after `now`, if chrono can represent it
fn expiry_after(now: DateTime<Utc>, expires_in: u64) -> Option<DateTime<Utc>> {
    i64::try_from(expires_in)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
}

/// OAuth client credentials registered with the storage provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    /// Creates credentials, rejecting empty values
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();

        if client_id.trim().is_empty() {
            return Err(DomainError::MissingCredentials("client_id".to_string()));
        }
        if client_secret.trim().is_empty() {
            return Err(DomainError::MissingCredentials("client_secret".to_string()));
        }

        Ok(Self {
            client_id,
            client_secret,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// OAuth tokens received from the provider's token endpoint
///
/// The access token is usable while `now < expires_at - margin`. The refresh
/// token is long-lived and is carried over unchanged when a refresh response
/// omits it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token for minting new access tokens without user interaction
    pub refresh_token: Option<String>,
    /// Absolute expiry of the access token
    pub expires_at: DateTime<Utc>,
    /// Lifetime reported by the provider, in seconds (informational)
    pub expires_in: u64,
}

impl TokenSet {
    /// Builds a token set whose expiry is `expires_in` seconds from now
    ///
    /// A lifetime too large to represent is replaced by
    /// [`DEFAULT_TOKEN_LIFETIME_SECS`].
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: Option<u64>,
    ) -> Self {
        let now = Utc::now();
        let requested = expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let (expires_at, expires_in) = match expiry_after(now, requested) {
            Some(at) => (at, requested),
            None => (
                now + Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS as i64),
                DEFAULT_TOKEN_LIFETIME_SECS,
            ),
        };
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
            expires_in,
        }
    }

    /// Returns true if the access token is within `margin` of its expiry
    pub fn is_expired(&self, margin: Duration) -> bool {
        self.is_expired_at(Utc::now(), margin)
    }

    /// Same as [`TokenSet::is_expired`] against an explicit clock reading
    pub fn is_expired_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        is_expired_at(self.expires_at, now, margin)
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Authentication state derived from the currently held tokens
///
/// Transitions are never implicit: `Stale` only becomes `Fresh` through an
/// explicit refresh, and a failed refresh drops back to `Unauthenticated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// No tokens held; interactive authorization is required
    Unauthenticated,
    /// Access token is valid beyond the safety margin
    Fresh,
    /// Access token is expired or about to expire
    Stale,
}

impl AuthState {
    /// Classifies the given tokens at `now`
    pub fn of(tokens: Option<&TokenSet>, now: DateTime<Utc>, margin: Duration) -> Self {
        match tokens {
            None => AuthState::Unauthenticated,
            Some(t) if t.is_expired_at(now, margin) => AuthState::Stale,
            Some(_) => AuthState::Fresh,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthState::Unauthenticated)
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthState::Unauthenticated => write!(f, "unauthenticated"),
            AuthState::Fresh => write!(f, "authenticated"),
            AuthState::Stale => write!(f, "authenticated (token stale)"),
        }
    }
}
