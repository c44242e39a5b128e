//! Configuration module for driveup.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.
//! Configuration is read-only at runtime; editing it is left to the front end.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{Credentials, DomainError};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for driveup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub auth: AuthConfig,
    pub upload: UploadConfig,
    pub endpoints: EndpointsConfig,
    pub logging: LoggingConfig,
}

/// OAuth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth client ID. `None` until the user registers an application.
    pub client_id: Option<String>,
    /// OAuth client secret paired with `client_id`.
    pub client_secret: Option<String>,
    /// Local port the authorization redirect is received on.
    pub redirect_port: u16,
    /// Seconds to wait for the browser redirect before giving up.
    pub authorization_timeout_secs: u64,
    /// Seconds before expiry at which an access token is treated as stale.
    pub expiry_margin_secs: u64,
}

/// Upload pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Destination folder path used when none is given.
    pub default_folder: String,
    /// Deadline for metadata and control calls (folder lookup, permissions, links).
    pub metadata_timeout_secs: u64,
    /// Deadline for the upload call itself.
    pub upload_timeout_secs: u64,
}

/// Provider endpoints. Overridable for proxies and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub auth_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub upload_base_url: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/driveup/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("driveup")
            .join("config.yaml")
    }

    /// Builds [`Credentials`] from the `auth` section.
    pub fn credentials(&self) -> Result<Credentials, DomainError> {
        let client_id = self
            .auth
            .client_id
            .clone()
            .ok_or_else(|| DomainError::MissingCredentials("auth.client_id".to_string()))?;
        let client_secret = self
            .auth
            .client_secret
            .clone()
            .ok_or_else(|| DomainError::MissingCredentials("auth.client_secret".to_string()))?;
        Credentials::new(client_id, client_secret)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Google OAuth2 authorization endpoint
pub const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google OAuth2 token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Drive v3 metadata API
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
/// Drive v3 media upload API
pub const DEFAULT_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_port: 8765,
            authorization_timeout_secs: 120,
            expiry_margin_secs: 60,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            default_folder: "driveup".to_string(),
            metadata_timeout_secs: 15,
            upload_timeout_secs: 60,
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            upload_base_url: DEFAULT_UPLOAD_BASE_URL.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"upload.upload_timeout_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Smallest accepted `auth.expiry_margin_secs`.
const MIN_EXPIRY_MARGIN_SECS: u64 = 60;

/// Largest accepted `auth.expiry_margin_secs`; half a typical token lifetime.
const MAX_EXPIRY_MARGIN_SECS: u64 = 1800;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid. Missing credentials
    /// are not reported here; they only matter once authorization starts.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- auth ---
        if self.auth.redirect_port == 0 {
            errors.push(ValidationError {
                field: "auth.redirect_port".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.auth.authorization_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "auth.authorization_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.auth.expiry_margin_secs < MIN_EXPIRY_MARGIN_SECS {
            errors.push(ValidationError {
                field: "auth.expiry_margin_secs".into(),
                message: format!("must be at least {}", MIN_EXPIRY_MARGIN_SECS),
            });
        } else if self.auth.expiry_margin_secs > MAX_EXPIRY_MARGIN_SECS {
            errors.push(ValidationError {
                field: "auth.expiry_margin_secs".into(),
                message: format!("must be at most {}", MAX_EXPIRY_MARGIN_SECS),
            });
        }

        // --- upload ---
        if self.upload.metadata_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "upload.metadata_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.upload.upload_timeout_secs < self.upload.metadata_timeout_secs {
            errors.push(ValidationError {
                field: "upload.upload_timeout_secs".into(),
                message: format!(
                    "upload_timeout_secs ({}) must not be shorter than metadata_timeout_secs ({})",
                    self.upload.upload_timeout_secs, self.upload.metadata_timeout_secs
                ),
            });
        }

        // --- endpoints ---
        for (field, value) in [
            ("endpoints.auth_url", &self.endpoints.auth_url),
            ("endpoints.token_url", &self.endpoints.token_url),
            ("endpoints.api_base_url", &self.endpoints.api_base_url),
            ("endpoints.upload_base_url", &self.endpoints.upload_base_url),
        ] {
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("not an http(s) URL: '{}'", value),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use driveup_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .auth_client_id("1234.apps.googleusercontent.com")
///     .auth_client_secret("secret")
///     .upload_default_folder("Notes/Attachments")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- auth ---

    pub fn auth_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.auth.client_id = Some(client_id.into());
        self
    }

    pub fn auth_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.config.auth.client_secret = Some(client_secret.into());
        self
    }

    pub fn auth_redirect_port(mut self, port: u16) -> Self {
        self.config.auth.redirect_port = port;
        self
    }

    pub fn auth_authorization_timeout_secs(mut self, secs: u64) -> Self {
        self.config.auth.authorization_timeout_secs = secs;
        self
    }

    pub fn auth_expiry_margin_secs(mut self, secs: u64) -> Self {
        self.config.auth.expiry_margin_secs = secs;
        self
    }

    // --- upload ---

    pub fn upload_default_folder(mut self, folder: impl Into<String>) -> Self {
        self.config.upload.default_folder = folder.into();
        self
    }

    pub fn upload_metadata_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload.metadata_timeout_secs = secs;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload.upload_timeout_secs = secs;
        self
    }

    // --- endpoints ---

    pub fn endpoints_auth_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.auth_url = url.into();
        self
    }

    pub fn endpoints_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.token_url = url.into();
        self
    }

    pub fn endpoints_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.api_base_url = url.into();
        self
    }

    pub fn endpoints_upload_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoints.upload_base_url = url.into();
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
