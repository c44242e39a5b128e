//! Shared test helpers for Drive integration tests
//!
//! Provides a wiremock server standing in for both Google's token endpoint
//! and the Drive API, plus doubles for the browser and the redirect listener.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use driveup_core::domain::{Credentials, TokenSet, UploadProgress, UploadStage};
use driveup_core::ports::TokenPersister;
use driveup_drive::auth::{BrowserLauncher, DriveAuthenticator, OAuth2Config};
use driveup_drive::callback::{CallbackParams, RedirectListener};
use driveup_drive::client::DriveClient;
use driveup_drive::pipeline::UploadPipeline;
use driveup_drive::timeout::Timeouts;
use driveup_drive::token::TokenManager;
use driveup_drive::{DriveError, DriveResult};

pub const TOKEN_PATH: &str = "/token";
pub const FILES_PATH: &str = "/drive/v3/files";
pub const UPLOAD_PATH: &str = "/upload/drive/v3/files";

// ============================================================================
// Construction
// ============================================================================

pub fn test_oauth_config(server: &MockServer) -> OAuth2Config {
    OAuth2Config::new(Credentials::new("test-client-id", "test-client-secret").unwrap())
        .with_endpoints(
            format!("{}/auth", server.uri()),
            format!("{}{}", server.uri(), TOKEN_PATH),
        )
        .with_authorization_timeout(Duration::from_secs(5))
}

pub fn test_client(server: &MockServer) -> DriveClient {
    DriveClient::with_base_urls(
        format!("{}/drive/v3", server.uri()),
        format!("{}/upload/drive/v3", server.uri()),
    )
}

pub fn fresh_tokens() -> TokenSet {
    TokenSet::new("test-access-token", Some("test-refresh-token".to_string()), Some(3600))
}

/// Tokens that expired ten seconds ago
pub fn stale_tokens() -> TokenSet {
    let mut tokens = TokenSet::new("stale-access-token", Some("test-refresh-token".to_string()), Some(3600));
    tokens.expires_at = Utc::now() - chrono::Duration::seconds(10);
    tokens
}

/// Builds a pipeline against `server` holding `tokens`
pub fn setup_pipeline(
    server: &MockServer,
    tokens: Option<TokenSet>,
    persister: Arc<dyn TokenPersister>,
) -> UploadPipeline {
    setup_pipeline_with_timeouts(server, tokens, persister, Timeouts::default())
}

pub fn setup_pipeline_with_timeouts(
    server: &MockServer,
    tokens: Option<TokenSet>,
    persister: Arc<dyn TokenPersister>,
    timeouts: Timeouts,
) -> UploadPipeline {
    let authenticator = DriveAuthenticator::new(test_oauth_config(server)).unwrap();
    let mut manager = TokenManager::new(authenticator, persister);
    if let Some(tokens) = tokens {
        manager = manager.with_tokens(tokens);
    }
    UploadPipeline::new(Arc::new(manager), test_client(server).with_timeouts(timeouts))
}

// ============================================================================
// Recorders
// ============================================================================

/// Collects every progress event in order
#[derive(Default)]
pub struct ProgressLog {
    events: Mutex<Vec<UploadProgress>>,
}

impl ProgressLog {
    pub fn record(&self, event: UploadProgress) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<UploadProgress> {
        self.events.lock().unwrap().clone()
    }

    pub fn stages(&self) -> Vec<UploadStage> {
        self.events().iter().map(|e| e.stage).collect()
    }

    pub fn percents(&self) -> Vec<u8> {
        self.events().iter().map(|e| e.progress).collect()
    }
}

/// Persister that remembers what it was given
#[derive(Default)]
pub struct RecordingPersister {
    pub stored: Mutex<Vec<TokenSet>>,
}

#[async_trait::async_trait]
impl TokenPersister for RecordingPersister {
    async fn persist(&self, tokens: &TokenSet) -> anyhow::Result<()> {
        self.stored.lock().unwrap().push(tokens.clone());
        Ok(())
    }
}

/// Persister that notes how many upload requests the server had seen when it ran
pub struct OrderingPersister {
    pub server: Arc<MockServer>,
    pub uploads_seen: Mutex<Vec<usize>>,
    pub stored: Mutex<Vec<TokenSet>>,
}

impl OrderingPersister {
    pub fn new(server: Arc<MockServer>) -> Self {
        Self {
            server,
            uploads_seen: Mutex::new(Vec::new()),
            stored: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl TokenPersister for OrderingPersister {
    async fn persist(&self, tokens: &TokenSet) -> anyhow::Result<()> {
        let uploads = self
            .server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == UPLOAD_PATH)
            .count();
        self.uploads_seen.lock().unwrap().push(uploads);
        self.stored.lock().unwrap().push(tokens.clone());
        Ok(())
    }
}

// ============================================================================
// Browser and redirect doubles
// ============================================================================

/// URL most recently "opened", shared between the browser and listener doubles
pub type OpenedUrl = Arc<Mutex<Option<String>>>;

/// Records the URL instead of opening a browser
pub struct RecordingBrowser {
    pub opened: OpenedUrl,
}

impl BrowserLauncher for RecordingBrowser {
    fn open(&self, url: &str) -> DriveResult<()> {
        *self.opened.lock().unwrap() = Some(url.to_string());
        Ok(())
    }
}

/// Follows the redirect like a user clicking "Allow" would
///
/// Reads the redirect URI and state from the authorization URL and sends the
/// browser's GET to the local listener.
pub struct ConsentingBrowser {
    pub code: String,
    pub opened: OpenedUrl,
}

impl BrowserLauncher for ConsentingBrowser {
    fn open(&self, url: &str) -> DriveResult<()> {
        *self.opened.lock().unwrap() = Some(url.to_string());

        let parsed = url::Url::parse(url).unwrap();
        let param = |name: &str| {
            parsed
                .query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .unwrap()
        };
        let redirect = format!(
            "{}?code={}&state={}",
            param("redirect_uri"),
            self.code,
            param("state")
        );

        tokio::spawn(async move {
            let _ = reqwest::get(&redirect).await;
        });
        Ok(())
    }
}

/// How [`ScriptedRedirect`] answers
#[derive(Clone)]
pub enum RedirectScript {
    /// Return `code` with the state issued in the authorization URL
    Grant(String),
    /// Return `code` with a forged state
    ForgedState(String),
    /// The provider reported an error
    Deny(String),
}

/// Listener that answers from a script instead of a socket
pub struct ScriptedRedirect {
    pub script: RedirectScript,
    pub opened: OpenedUrl,
}

#[async_trait::async_trait]
impl RedirectListener for ScriptedRedirect {
    fn redirect_uri(&self) -> String {
        "http://127.0.0.1:8765/callback".to_string()
    }

    async fn await_redirect(self: Box<Self>, _timeout: Duration) -> DriveResult<CallbackParams> {
        let issued_state = self
            .opened
            .lock()
            .unwrap()
            .as_deref()
            .and_then(|u| url::Url::parse(u).ok())
            .and_then(|u| {
                u.query_pairs()
                    .find(|(k, _)| k == "state")
                    .map(|(_, v)| v.into_owned())
            })
            .unwrap_or_default();

        match self.script {
            RedirectScript::Grant(code) => Ok(CallbackParams {
                code,
                state: issued_state,
            }),
            RedirectScript::ForgedState(code) => Ok(CallbackParams {
                code,
                state: "forged".to_string(),
            }),
            RedirectScript::Deny(reason) => Err(DriveError::Authorization(format!(
                "Authorization was not granted: {}",
                reason
            ))),
        }
    }
}

// ============================================================================
// Mock endpoints
// ============================================================================

/// Mounts a token endpoint answering every grant with `access_token`
pub async fn mount_token_endpoint(server: &MockServer, access_token: &str, refresh_token: Option<&str>) {
    let mut body = json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3599,
        "scope": "https://www.googleapis.com/auth/drive.file"
    });
    if let Some(refresh) = refresh_token {
        body["refresh_token"] = json!(refresh);
    }
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts folder search returning no matches
pub async fn mount_folder_search_empty(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(FILES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "files": [] })))
        .mount(server)
        .await;
}

/// Mounts folder creation answering with `folder_id`
pub async fn mount_folder_create(server: &MockServer, folder_id: &str) {
    Mock::given(method("POST"))
        .and(path(FILES_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": folder_id })))
        .mount(server)
        .await;
}

/// Mounts a successful multipart upload answering with `file_id`
pub async fn mount_upload(server: &MockServer, file_id: &str, name: &str) {
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": file_id,
            "name": name,
            "mimeType": "image/png"
        })))
        .mount(server)
        .await;
}

/// Mounts the permission endpoint for `file_id` answering with `status`
pub async fn mount_permission(server: &MockServer, file_id: &str, status: u16) {
    Mock::given(method("POST"))
        .and(path(format!("{}/{}/permissions", FILES_PATH, file_id)))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "id": "anyoneWithLink",
            "type": "anyone",
            "role": "reader"
        })))
        .mount(server)
        .await;
}

/// Mounts the link lookup for `file_id`
pub async fn mount_links(server: &MockServer, file_id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", FILES_PATH, file_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": file_id,
            "webViewLink": format!("https://drive.google.com/file/d/{}/view?usp=drivesdk", file_id),
            "webContentLink": format!("https://drive.google.com/uc?id={}&export=download", file_id)
        })))
        .mount(server)
        .await;
}

/// Mounts everything a successful upload into a new top-level folder needs
pub async fn mount_happy_path(server: &MockServer, folder_id: &str, file_id: &str, name: &str) {
    mount_folder_search_empty(server).await;
    mount_folder_create(server, folder_id).await;
    mount_upload(server, file_id, name).await;
    mount_permission(server, file_id, 200).await;
    mount_links(server, file_id).await;
}
