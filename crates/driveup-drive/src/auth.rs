//! OAuth2 authorization for Google Drive
//!
//! Implements the Authorization Code flow with PKCE (RFC 7636) and a loopback
//! redirect, as recommended for installed applications. Offline access is
//! requested so the provider issues a refresh token.
//!
//! ## Components
//!
//! - [`OAuth2Config`] - Credentials, endpoints, scopes and deadlines
//! - [`AuthCodeFlow`] - Authorization URL, code exchange and refresh
//! - [`PendingAuthorization`] - An issued authorization request awaiting its redirect
//! - [`BrowserLauncher`] - Opens the consent page
//! - [`DriveAuthenticator`] - Orchestrates the interactive flow and refreshes
//!
//! ## Flow
//!
//! ```text
//! AuthCodeFlow::begin(listener) -> PendingAuthorization   (URL + CSRF + PKCE issued)
//!        browser opened on PendingAuthorization::auth_url()
//! PendingAuthorization::complete(timeout) -> TokenSet      (redirect awaited, code exchanged)
//! ```

use std::borrow::Cow;
use std::time::Duration;

use chrono::{DateTime, Utc};
use driveup_core::config::Config;
use driveup_core::domain::{expiry_margin, is_expired_at, Credentials, DomainError, TokenSet};
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use tracing::{debug, info, warn};

use crate::callback::{LocalCallbackServer, RedirectListener};
use crate::timeout::{with_timeout, METADATA_TIMEOUT};
use crate::{DriveError, DriveResult};

/// Scope granting access to files created by this application
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Default local port for the redirect listener
pub const DEFAULT_REDIRECT_PORT: u16 = 8765;

/// Default time to wait for the user to finish in the browser
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Default safety margin before expiry at which a token counts as stale
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

type ConfiguredClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Returns true when `now` is within `margin` of `expires_at` (or past it)
pub fn is_token_expired(expires_at: DateTime<Utc>, margin: Duration) -> bool {
    is_expired_at(expires_at, Utc::now(), expiry_margin(margin))
}

// ============================================================================
// OAuth2Config
// ============================================================================

/// Configuration for the OAuth2 flow
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// Client id and secret from the provider's console
    pub credentials: Credentials,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
    /// Local port for the redirect listener
    pub redirect_port: u16,
    /// Maximum wait for the browser redirect
    pub authorization_timeout: Duration,
    /// Tokens within this margin of expiry are refreshed proactively
    pub expiry_margin: Duration,
    /// Deadline for token endpoint calls
    pub request_timeout: Duration,
}

impl OAuth2Config {
    /// Creates a config for Google's endpoints with default settings
    pub fn new(credentials: Credentials) -> Self {
        let defaults = driveup_core::config::EndpointsConfig::default();
        Self {
            credentials,
            auth_url: defaults.auth_url,
            token_url: defaults.token_url,
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            redirect_port: DEFAULT_REDIRECT_PORT,
            authorization_timeout: DEFAULT_AUTHORIZATION_TIMEOUT,
            expiry_margin: DEFAULT_EXPIRY_MARGIN,
            request_timeout: METADATA_TIMEOUT,
        }
    }

    /// Builds the OAuth settings from the application configuration
    pub fn from_config(config: &Config) -> Result<Self, DomainError> {
        Ok(Self {
            credentials: config.credentials()?,
            auth_url: config.endpoints.auth_url.clone(),
            token_url: config.endpoints.token_url.clone(),
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            redirect_port: config.auth.redirect_port,
            authorization_timeout: Duration::from_secs(config.auth.authorization_timeout_secs),
            expiry_margin: Duration::from_secs(config.auth.expiry_margin_secs),
            request_timeout: Duration::from_secs(config.upload.metadata_timeout_secs),
        })
    }

    /// Overrides the requested scopes
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Points the flow at different authorization and token endpoints
    pub fn with_endpoints(mut self, auth_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        self.auth_url = auth_url.into();
        self.token_url = token_url.into();
        self
    }

    pub fn with_authorization_timeout(mut self, timeout: Duration) -> Self {
        self.authorization_timeout = timeout;
        self
    }

    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = margin;
        self
    }
}

// ============================================================================
// AuthCodeFlow
// ============================================================================

/// Authorization-code flow built on the `oauth2` crate
///
/// Generates authorization URLs with PKCE challenges, exchanges
/// authorization codes for tokens, and refreshes tokens.
pub struct AuthCodeFlow {
    client: ConfiguredClient,
    scopes: Vec<String>,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl AuthCodeFlow {
    /// Creates a flow for the given configuration
    pub fn new(config: &OAuth2Config) -> DriveResult<Self> {
        let client = BasicClient::new(ClientId::new(
            config.credentials.client_id().to_string(),
        ))
        .set_client_secret(ClientSecret::new(
            config.credentials.client_secret().to_string(),
        ))
        .set_auth_type(AuthType::RequestBody)
        .set_auth_uri(AuthUrl::new(config.auth_url.clone()).map_err(|e| {
            DriveError::Authorization(format!("Invalid authorization URL: {}", e))
        })?)
        .set_token_uri(
            TokenUrl::new(config.token_url.clone())
                .map_err(|e| DriveError::Authorization(format!("Invalid token URL: {}", e)))?,
        );

        // Token endpoints must not be followed through redirects
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
            http,
            request_timeout: config.request_timeout,
        })
    }

    /// Issues an authorization request that redirects to `listener`
    ///
    /// The listener must already be bound so the redirect cannot arrive
    /// before anyone is waiting for it.
    pub fn begin(&self, listener: Box<dyn RedirectListener>) -> DriveResult<PendingAuthorization<'_>> {
        let redirect_uri = listener.redirect_uri();
        let redirect_url = RedirectUrl::new(redirect_uri.clone())
            .map_err(|e| DriveError::Authorization(format!("Invalid redirect URI: {}", e)))?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = self
            .client
            .authorize_url(CsrfToken::new_random)
            .set_redirect_uri(Cow::Owned(redirect_url))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");

        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let (auth_url, csrf) = request.set_pkce_challenge(pkce_challenge).url();

        debug!("Generated authorization URL");
        Ok(PendingAuthorization {
            flow: self,
            auth_url: auth_url.to_string(),
            csrf,
            pkce_verifier,
            redirect_uri,
            listener,
        })
    }

    /// Exchanges an authorization code for tokens
    ///
    /// A non-success answer from the token endpoint is an
    /// [`DriveError::Authorization`].
    pub async fn exchange_code(
        &self,
        code: String,
        pkce_verifier: PkceCodeVerifier,
        redirect_uri: &str,
    ) -> DriveResult<TokenSet> {
        info!("Exchanging authorization code for tokens");

        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| DriveError::Authorization(format!("Invalid redirect URI: {}", e)))?;

        let request = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .set_redirect_uri(Cow::Owned(redirect_url));

        let token_result = with_timeout("Authorization code exchange", self.request_timeout, async {
            request
                .request_async(&self.http)
                .await
                .map_err(|e| DriveError::Authorization(describe_token_error(&e)))
        })
        .await?;

        let refresh_token = token_result.refresh_token().map(|t| t.secret().to_string());
        if refresh_token.is_none() {
            warn!("Token endpoint issued no refresh token; the session cannot be refreshed");
        }

        let tokens = TokenSet::new(
            token_result.access_token().secret().to_string(),
            refresh_token,
            token_result.expires_in().map(|d| d.as_secs()),
        );

        info!(expires_in = tokens.expires_in, "Successfully obtained OAuth tokens");
        Ok(tokens)
    }

    /// Mints a new access token from a refresh token
    ///
    /// The refresh token is passed through unchanged when the response does
    /// not rotate it. A rejected refresh token, or an answer that is not a
    /// token response, is a [`DriveError::Refresh`]. Failing to reach the
    /// endpoint at all is a [`DriveError::TokenEndpoint`].
    pub async fn refresh(&self, refresh_token: &str) -> DriveResult<TokenSet> {
        info!("Refreshing access token");

        let refresh = RefreshToken::new(refresh_token.to_string());
        let request = self.client.exchange_refresh_token(&refresh);

        let token_result = with_timeout("Token refresh", self.request_timeout, async {
            request
                .request_async(&self.http)
                .await
                .map_err(|e| match e {
                    RequestTokenError::Request(_) => {
                        DriveError::TokenEndpoint(describe_token_error(&e))
                    }
                    _ => DriveError::Refresh(describe_token_error(&e)),
                })
        })
        .await?;

        let tokens = TokenSet::new(
            token_result.access_token().secret().to_string(),
            token_result
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| Some(refresh_token.to_string())),
            token_result.expires_in().map(|d| d.as_secs()),
        );

        info!(expires_in = tokens.expires_in, "Successfully refreshed access token");
        Ok(tokens)
    }
}

fn describe_token_error<RE>(err: &RequestTokenError<RE, BasicErrorResponse>) -> String
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => match response.error_description() {
            Some(description) => format!("{}: {}", response.error(), description),
            None => response.error().to_string(),
        },
        other => {
            let mut message = other.to_string();
            let mut source = std::error::Error::source(other);
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = cause.source();
            }
            message
        }
    }
}

// ============================================================================
// PendingAuthorization
// ============================================================================

/// An authorization request that has been issued but not yet answered
///
/// Holds the CSRF token and PKCE verifier needed to finish the exchange, and
/// the listener the redirect will arrive on. Dropping it releases the
/// listener.
pub struct PendingAuthorization<'a> {
    flow: &'a AuthCodeFlow,
    auth_url: String,
    csrf: CsrfToken,
    pkce_verifier: PkceCodeVerifier,
    redirect_uri: String,
    listener: Box<dyn RedirectListener>,
}

impl PendingAuthorization<'_> {
    /// URL of the provider's consent page
    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Redirect URI registered in the request
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Waits for the redirect and exchanges the code
    ///
    /// Fails with [`DriveError::Authorization`] on timeout, cancellation,
    /// CSRF mismatch or a failed exchange.
    pub async fn complete(self, timeout: Duration) -> DriveResult<TokenSet> {
        let PendingAuthorization {
            flow,
            csrf,
            pkce_verifier,
            redirect_uri,
            listener,
            ..
        } = self;

        let callback = listener.await_redirect(timeout).await?;

        if callback.state != *csrf.secret() {
            warn!("OAuth callback state does not match the issued CSRF token");
            return Err(DriveError::Authorization(
                "State parameter mismatch in authorization redirect".to_string(),
            ));
        }

        flow.exchange_code(callback.code, pkce_verifier, &redirect_uri)
            .await
    }
}

// ============================================================================
// BrowserLauncher
// ============================================================================

/// Opens the provider's consent page for the user
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> DriveResult<()>;
}

/// Opens URLs in the system's default browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> DriveResult<()> {
        webbrowser::open(url)
            .map_err(|e| DriveError::Authorization(format!("Failed to open browser: {}", e)))
    }
}

// ============================================================================
// DriveAuthenticator
// ============================================================================

/// High-level authenticator for the Drive API
///
/// Drives interactive authorization, reports token staleness, and performs
/// silent refresh. It holds no token state itself; see
/// [`TokenManager`](crate::token::TokenManager).
pub struct DriveAuthenticator {
    config: OAuth2Config,
    flow: AuthCodeFlow,
    browser: Box<dyn BrowserLauncher>,
}

impl DriveAuthenticator {
    /// Creates an authenticator that opens the system browser
    pub fn new(config: OAuth2Config) -> DriveResult<Self> {
        Self::with_browser(config, Box::new(SystemBrowser))
    }

    /// Creates an authenticator with a custom browser launcher
    pub fn with_browser(
        config: OAuth2Config,
        browser: Box<dyn BrowserLauncher>,
    ) -> DriveResult<Self> {
        let flow = AuthCodeFlow::new(&config)?;
        Ok(Self {
            config,
            flow,
            browser,
        })
    }

    /// Runs the interactive flow on the configured loopback port
    pub async fn start_authorization(&self) -> DriveResult<TokenSet> {
        let listener = LocalCallbackServer::bind(self.config.redirect_port).await?;
        self.start_authorization_with(Box::new(listener)).await
    }

    /// Runs the interactive flow, receiving the redirect on `listener`
    ///
    /// 1. Issues the authorization URL (CSRF state + PKCE challenge)
    /// 2. Opens the consent page
    /// 3. Waits, bounded by the configured timeout, for the redirect
    /// 4. Exchanges the code for tokens
    pub async fn start_authorization_with(
        &self,
        listener: Box<dyn RedirectListener>,
    ) -> DriveResult<TokenSet> {
        info!("Starting OAuth2 authorization flow");

        let pending = self.flow.begin(listener)?;

        info!("Opening browser for authorization");
        if let Err(e) = self.browser.open(pending.auth_url()) {
            warn!("{}; open this URL manually: {}", e, pending.auth_url());
        }

        let tokens = pending.complete(self.config.authorization_timeout).await?;

        info!("OAuth2 authorization completed successfully");
        Ok(tokens)
    }

    /// Refreshes an access token
    pub async fn refresh_access_token(&self, refresh_token: &str) -> DriveResult<TokenSet> {
        self.flow.refresh(refresh_token).await
    }

    /// Returns true if a token expiring at `expires_at` should be refreshed now
    pub fn is_token_expired(&self, expires_at: DateTime<Utc>) -> bool {
        is_token_expired(expires_at, self.config.expiry_margin)
    }

    /// Safety margin applied by [`DriveAuthenticator::is_token_expired`]
    pub fn expiry_margin(&self) -> Duration {
        self.config.expiry_margin
    }

    /// Returns a reference to the current configuration
    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Returns the underlying authorization-code flow
    pub fn flow(&self) -> &AuthCodeFlow {
        &self.flow
    }
}
