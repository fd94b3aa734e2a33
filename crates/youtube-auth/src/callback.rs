//! Local HTTP listener for the OAuth redirect
//!
//! Binds the redirect target's loopback address, serves until one request
//! carries an authorization code with the expected `state`, then shuts
//! down. Anything else (favicon fetches, scanners, a denied consent) gets a
//! 400 and the listener keeps waiting until the deadline.
//!
//! For a `localhost` redirect the listener binds 127.0.0.1 and, when the
//! host has IPv6, also [::1] on the same port, so browsers that resolve
//! `localhost` to either family reach it.
//!
//! The server task is always stopped and joined before `wait_for_code`
//! returns, so the port is free again on every exit path. Dropping a
//! `CallbackServer` without waiting aborts the task.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// How long a stopping listener may take to finish its last response.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str =
    "<html><body><h1>Authentication successful!</h1><p>You can close this tab.</p></body></html>";

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    code_tx: Arc<Mutex<Option<oneshot::Sender<String>>>>,
}

/// A running callback listener for one interactive flow.
pub struct CallbackServer {
    redirect_uri: String,
    local_addr: SocketAddr,
    /// Second listener on [::1] for `localhost` redirects
    ipv6_addr: Option<SocketAddr>,
    code_rx: oneshot::Receiver<String>,
    shutdown_tx: watch::Sender<bool>,
    server: JoinHandle<std::io::Result<()>>,
}

impl CallbackServer {
    /// Bind the redirect target and start serving.
    ///
    /// The redirect URI must be plain `http` on a loopback host. A port of
    /// `0` lets the OS choose; the chosen port is substituted into
    /// `redirect_uri()` so the authorization URL and code exchange use it.
    pub async fn start(redirect_uri: &str, expected_state: String) -> Result<Self> {
        let mut url = reqwest::Url::parse(redirect_uri).map_err(|e| {
            Error::Configuration(format!("invalid redirect URI {redirect_uri}: {e}"))
        })?;
        let bind_addr = loopback_addr(&url)?;

        let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
            Error::Io(format!("binding callback listener on {bind_addr}: {e}"))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Io(format!("reading callback listener address: {e}")))?;

        let redirect_uri = if url.port() == Some(0) {
            // set_port only fails for URLs that cannot carry a port, ruled out above
            let _ = url.set_port(Some(local_addr.port()));
            url.to_string()
        } else {
            redirect_uri.to_string()
        };

        let ipv6_listener = if url.host_str() == Some("localhost") {
            let addr = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), local_addr.port());
            match TcpListener::bind(addr).await {
                Ok(listener) => Some(listener),
                Err(e) => {
                    debug!(addr = %addr, error = %e, "IPv6 loopback unavailable, serving IPv4 only");
                    None
                }
            }
        } else {
            None
        };
        let ipv6_addr = ipv6_listener
            .as_ref()
            .and_then(|listener| listener.local_addr().ok());

        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let app = callback_router(CallbackState {
            expected_state: expected_state.into(),
            code_tx: Arc::new(Mutex::new(Some(code_tx))),
        });

        let server = tokio::spawn(async move {
            let primary = serve(listener, app.clone(), shutdown_rx.clone());
            match ipv6_listener {
                Some(listener) => {
                    let (a, b) = tokio::join!(primary, serve(listener, app, shutdown_rx));
                    a.and(b)
                }
                None => primary.await,
            }
        });

        info!(addr = %local_addr, ipv6 = ?ipv6_addr, "waiting for OAuth callback");

        Ok(Self {
            redirect_uri,
            local_addr,
            ipv6_addr,
            code_rx,
            shutdown_tx,
            server,
        })
    }

    /// The redirect URI to embed in the authorization URL.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn ipv6_addr(&self) -> Option<SocketAddr> {
        self.ipv6_addr
    }

    /// Wait for the authorization code, then stop the listener.
    ///
    /// The deadline is wall-clock and does not reset when malformed
    /// requests arrive.
    pub async fn wait_for_code(mut self, timeout: Duration) -> Result<String> {
        let outcome = tokio::time::timeout(timeout, &mut self.code_rx).await;
        self.shutdown().await;

        match outcome {
            Ok(Ok(code)) => {
                info!("authorization code received");
                Ok(code)
            }
            Ok(Err(_)) => Err(Error::Internal(
                "callback listener stopped before a code arrived".into(),
            )),
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "timed out waiting for OAuth callback");
                Err(Error::AuthTimeout(timeout))
            }
        }
    }

    async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(true);

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut self.server).await {
            Ok(Ok(Ok(()))) => debug!(addr = %self.local_addr, "callback listener stopped"),
            Ok(Ok(Err(e))) => warn!(error = %e, "callback listener failed"),
            Ok(Err(e)) => warn!(error = %e, "callback listener task panicked"),
            Err(_) => {
                warn!("callback listener did not stop in time, aborting");
                self.server.abort();
                let _ = (&mut self.server).await;
            }
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        self.server.abort();
    }
}

async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
}

/// Resolve the socket address to bind for a redirect URI.
fn loopback_addr(url: &reqwest::Url) -> Result<SocketAddr> {
    if url.scheme() != "http" {
        return Err(Error::Configuration(format!(
            "redirect URI must use http, got {url}"
        )));
    }

    let ip = match url.host_str() {
        Some("localhost") => IpAddr::V4(Ipv4Addr::LOCALHOST),
        Some(host) => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|_| {
                Error::Configuration(format!("redirect URI host must be loopback, got {host}"))
            })?,
        None => {
            return Err(Error::Configuration(format!(
                "redirect URI has no host: {url}"
            )));
        }
    };
    if !ip.is_loopback() {
        return Err(Error::Configuration(format!(
            "redirect URI host must be loopback, got {ip}"
        )));
    }

    let port = url.port_or_known_default().unwrap_or(80);
    Ok(SocketAddr::new(ip, port))
}

fn callback_router(state: CallbackState) -> Router {
    Router::new().fallback(handle_callback).with_state(state)
}

/// Accept the redirect. Only a request with a code and the matching state
/// completes the flow; everything else is answered with 400.
async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(error) = params.get("error") {
        warn!(error = %error, "authorization server reported an error, still waiting");
        return (
            StatusCode::BAD_REQUEST,
            format!("Authorization failed: {error}"),
        )
            .into_response();
    }

    let Some(code) = params.get("code").filter(|c| !c.is_empty()) else {
        debug!("callback request without code parameter");
        return (StatusCode::BAD_REQUEST, "Missing code parameter").into_response();
    };

    if params.get("state").map(String::as_str) != Some(&*state.expected_state) {
        warn!("callback state mismatch, ignoring request");
        return (StatusCode::BAD_REQUEST, "State mismatch").into_response();
    }

    match state.code_tx.lock().await.take() {
        Some(tx) => {
            let _ = tx.send(code.clone());
            (StatusCode::OK, Html(SUCCESS_PAGE)).into_response()
        }
        None => (StatusCode::BAD_REQUEST, "Authorization already completed").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> (CallbackState, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        (
            CallbackState {
                expected_state: Arc::from("expected"),
                code_tx: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    async fn call(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn missing_code_returns_400() {
        let (state, mut rx) = test_state();
        let app = callback_router(state);
        assert_eq!(call(app, "/?foo=bar").await, StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err(), "no code must be delivered");
    }

    #[tokio::test]
    async fn wrong_state_returns_400() {
        let (state, mut rx) = test_state();
        let app = callback_router(state);
        assert_eq!(
            call(app, "/?code=abc&state=forged").await,
            StatusCode::BAD_REQUEST
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn provider_error_returns_400() {
        let (state, _rx) = test_state();
        let app = callback_router(state);
        assert_eq!(
            call(app, "/?error=access_denied&state=expected").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn valid_callback_delivers_code_once() {
        let (state, rx) = test_state();
        let app = callback_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/oauth2callback?code=4%2F0abc&state=expected&scope=x")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Authentication successful"));

        assert_eq!(rx.await.unwrap(), "4/0abc");

        assert_eq!(
            call(app, "/?code=again&state=expected").await,
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn loopback_addr_resolution() {
        let url = reqwest::Url::parse("http://localhost:8080").unwrap();
        assert_eq!(
            loopback_addr(&url).unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );

        let url = reqwest::Url::parse("http://[::1]:9000/cb").unwrap();
        assert_eq!(
            loopback_addr(&url).unwrap(),
            "[::1]:9000".parse::<SocketAddr>().unwrap()
        );

        let url = reqwest::Url::parse("http://localhost").unwrap();
        assert_eq!(loopback_addr(&url).unwrap().port(), 80);
    }

    #[test]
    fn non_loopback_redirect_is_configuration_error() {
        for uri in [
            "https://localhost:8080",
            "http://example.com:8080",
            "http://10.0.0.5:8080",
        ] {
            let url = reqwest::Url::parse(uri).unwrap();
            assert!(
                matches!(loopback_addr(&url), Err(Error::Configuration(_))),
                "{uri} must be rejected"
            );
        }
    }

    #[tokio::test]
    async fn port_zero_is_substituted_in_redirect_uri() {
        let server = CallbackServer::start("http://127.0.0.1:0", "s".into())
            .await
            .unwrap();
        let port = server.local_addr().port();
        assert_ne!(port, 0);
        assert_eq!(server.redirect_uri(), format!("http://127.0.0.1:{port}/"));
    }

    #[tokio::test]
    async fn timeout_stops_listener_and_releases_port() {
        let server = CallbackServer::start("http://127.0.0.1:0", "s".into())
            .await
            .unwrap();
        let addr = server.local_addr();

        let err = server
            .wait_for_code(Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthTimeout(_)));

        // Port must be free again
        let rebound = TcpListener::bind(addr).await;
        assert!(rebound.is_ok(), "port {addr} still held after timeout");
    }

    #[tokio::test]
    async fn localhost_redirect_is_served_on_both_loopbacks() {
        let server = CallbackServer::start("http://localhost:0/cb", "st".into())
            .await
            .unwrap();
        let port = server.local_addr().port();
        assert_eq!(server.local_addr().ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(server.redirect_uri(), format!("http://localhost:{port}/cb"));

        // Hosts without IPv6 fall back to the IPv4 listener alone
        let Some(v6) = server.ipv6_addr() else {
            return;
        };
        assert_eq!(v6.port(), port);

        let url = format!("http://[::1]:{port}/cb?code=via-v6&state=st");
        let sender = tokio::spawn(async move { reqwest::get(url).await });

        let code = server
            .wait_for_code(Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(code, "via-v6");
        assert_eq!(sender.await.unwrap().unwrap().status().as_u16(), 200);

        assert!(TcpListener::bind(v6).await.is_ok(), "[::1]:{port} still held");
        assert!(
            TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
                .await
                .is_ok(),
            "127.0.0.1:{port} still held"
        );
    }

    #[tokio::test]
    async fn malformed_request_does_not_end_wait() {
        let server = CallbackServer::start("http://127.0.0.1:0", "good-state".into())
            .await
            .unwrap();
        let base = server.redirect_uri().to_string();

        let client = reqwest::Client::new();
        let bad = client.get(format!("{base}?nothing=here")).send().await.unwrap();
        assert_eq!(bad.status().as_u16(), 400);

        let good_url = format!("{base}?code=the-code&state=good-state");
        let sender = tokio::spawn(async move { client.get(good_url).send().await });

        let code = server
            .wait_for_code(Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(code, "the-code");
        assert_eq!(sender.await.unwrap().unwrap().status().as_u16(), 200);
    }
}
