//! Local listener for the OAuth2 redirect
//!
//! [`RedirectListener`] is the seam between the authorization flow and the
//! socket: the flow only needs a redirect URI to advertise and a single
//! bounded wait for the redirect. [`LocalCallbackServer`] is the real
//! implementation; tests substitute their own.
//!
//! The listening socket is owned by the server value and consumed by
//! [`RedirectListener::await_redirect`], so the port is released on every
//! exit path: redirect received, provider error, or timeout.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{DriveError, DriveResult};

/// Path the provider redirects the browser to
const CALLBACK_PATH: &str = "/callback";

/// Parameters extracted from a successful OAuth2 redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    /// The authorization code
    pub code: String,
    /// The CSRF state parameter
    pub state: String,
}

/// What the provider reported on the redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// The user granted access
    Code(CallbackParams),
    /// The user declined or the provider refused (`error=...`)
    Denied(String),
}

/// Receives exactly one authorization redirect
#[async_trait]
pub trait RedirectListener: Send {
    /// Redirect URI to register in the authorization request
    fn redirect_uri(&self) -> String;

    /// Waits at most `timeout` for the redirect, then releases the listener
    ///
    /// Fails with [`DriveError::Authorization`] on timeout or when the
    /// provider reports an error.
    async fn await_redirect(self: Box<Self>, timeout: Duration) -> DriveResult<CallbackParams>;
}

/// Minimal HTTP server on the loopback interface that waits for the redirect.
///
/// Requests that carry neither a code nor an error (a browser fetching
/// `/favicon.ico`, say) are answered and ignored.
pub struct LocalCallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl LocalCallbackServer {
    /// Binds `127.0.0.1:<port>`
    pub async fn bind(port: u16) -> DriveResult<Self> {
        Self::bind_addr(SocketAddr::from(([127, 0, 0, 1], port))).await
    }

    /// Binds an explicit address; port 0 picks a free port
    pub async fn bind_addr(addr: SocketAddr) -> DriveResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            DriveError::Authorization(format!("Failed to bind callback server to {}: {}", addr, e))
        })?;
        let addr = listener.local_addr()?;

        info!(%addr, "Started local OAuth callback server");
        Ok(Self { listener, addr })
    }

    /// Address the server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl RedirectListener for LocalCallbackServer {
    fn redirect_uri(&self) -> String {
        format!("http://{}{}", self.addr, CALLBACK_PATH)
    }

    async fn await_redirect(self: Box<Self>, timeout: Duration) -> DriveResult<CallbackParams> {
        let LocalCallbackServer { listener, addr } = *self;
        let (tx, mut rx) = mpsc::channel::<RedirectOutcome>(1);

        let wait = async move {
            loop {
                tokio::select! {
                    Some(outcome) = rx.recv() => return outcome,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "Callback server accepted connection");
                            tokio::spawn(serve_connection(stream, tx.clone()));
                        }
                        Err(e) => warn!("Callback server accept failed: {}", e),
                    },
                }
            }
        };

        // The listener lives inside `wait`; it is dropped when this returns.
        let outcome = tokio::time::timeout(timeout, wait).await.map_err(|_| {
            warn!(%addr, timeout_secs = timeout.as_secs(), "No OAuth redirect received");
            DriveError::Authorization(format!(
                "Timed out after {}s waiting for the authorization redirect",
                timeout.as_secs()
            ))
        })?;

        info!(%addr, "Stopped local OAuth callback server");
        match outcome {
            RedirectOutcome::Code(params) => {
                info!("Received OAuth callback with authorization code");
                Ok(params)
            }
            RedirectOutcome::Denied(reason) => Err(DriveError::Authorization(format!(
                "Authorization was not granted: {}",
                reason
            ))),
        }
    }
}

/// Serves a single HTTP/1 connection, forwarding the first meaningful redirect
async fn serve_connection(stream: TcpStream, tx: mpsc::Sender<RedirectOutcome>) {
    let io = TokioIo::new(stream);

    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
        let tx = tx.clone();
        async move {
            let uri = req.uri().to_string();
            debug!("Callback server received request: {}", req.uri().path());

            let (status, html) = match parse_callback_params(&uri) {
                Some(RedirectOutcome::Code(params)) => {
                    let _ = tx.try_send(RedirectOutcome::Code(params));
                    (StatusCode::OK, success_html())
                }
                Some(RedirectOutcome::Denied(reason)) => {
                    let page = error_html(&reason);
                    let _ = tx.try_send(RedirectOutcome::Denied(reason));
                    (StatusCode::BAD_REQUEST, page)
                }
                None => (
                    StatusCode::NOT_FOUND,
                    error_html("Missing authorization code in callback"),
                ),
            };

            let mut response = Response::new(Full::new(Bytes::from(html)));
            *response.status_mut() = status;
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            Ok::<_, hyper::Error>(response)
        }
    });

    if let Err(e) = http1::Builder::new()
        .keep_alive(false)
        .serve_connection(io, service)
        .await
    {
        warn!("Callback server connection error: {}", e);
    }
}

/// Parses the redirect URI into an outcome
///
/// Returns `None` when the request carries neither `code` nor `error`.
pub fn parse_callback_params(uri: &str) -> Option<RedirectOutcome> {
    let url = url::Url::parse(&format!("http://localhost{}", uri)).ok()?;
    let mut code = None;
    let mut state = None;
    let mut error = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.to_string()),
            "state" => state = Some(value.to_string()),
            "error" => error = Some(value.to_string()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Some(RedirectOutcome::Denied(error));
    }

    Some(RedirectOutcome::Code(CallbackParams {
        code: code?,
        state: state.unwrap_or_default(),
    }))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Returns the HTML for a successful authentication page
fn success_html() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>driveup - Authorization Successful</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authorization Successful</h1>
    <p>driveup can now upload files to your Google Drive.</p>
    <p>You can close this window.</p>
    <script>setTimeout(function() { window.close(); }, 3000);</script>
</body>
</html>"#
        .to_string()
}

/// Returns the HTML for an authentication error page
fn error_html(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>driveup - Authorization Error</title></head>
<body style="font-family: sans-serif; text-align: center; padding-top: 50px;">
    <h1>Authorization Error</h1>
    <p>{}</p>
    <p>Please close this window and try again.</p>
</body>
</html>"#,
        escape_html(message)
    )
}
