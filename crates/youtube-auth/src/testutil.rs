//! In-process stand-ins for Google's token endpoint, the YouTube API and a
//! browser, used by the unit tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use common::Secret;
use tokio::net::TcpListener;

use crate::browser::BrowserLauncher;
use crate::client_secrets::ClientSecrets;

pub fn test_secrets() -> ClientSecrets {
    ClientSecrets {
        client_id: "test-client".into(),
        client_secret: Some(Secret::new("test-secret".to_string())),
        redirect_uri: "http://127.0.0.1:0".into(),
    }
}

#[derive(Default)]
struct MockState {
    token_calls: AtomicUsize,
    probe_calls: AtomicUsize,
    api_calls: AtomicUsize,
    forms: Mutex<Vec<HashMap<String, String>>>,
    revoked: Mutex<HashSet<String>>,
}

impl MockState {
    /// Tokens the mock ever issues, plus the fixture `at_valid`, are
    /// accepted until revoked.
    fn accepts(&self, headers: &HeaderMap) -> bool {
        let Some(token) = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
        else {
            return false;
        };
        let known = ["at_valid", "at_refreshed_", "at_issued_"]
            .iter()
            .any(|prefix| token.starts_with(prefix));
        known && !self.revoked.lock().unwrap().contains(token)
    }
}

/// Mock Google: `POST /token`, `GET /youtube/v3/channels` (probe) and
/// `GET /youtube/v3/playlists`.
pub struct MockGoogle {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: tokio::task::JoinHandle<()>,
}

impl MockGoogle {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route("/token", post(token_handler))
            .route("/youtube/v3/channels", get(probe_handler))
            .route("/youtube/v3/playlists", get(playlists_handler))
            .with_state(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn token_endpoint(&self) -> String {
        format!("http://{}/token", self.addr)
    }

    pub fn api_base(&self) -> String {
        format!("http://{}/youtube/v3", self.addr)
    }

    pub fn token_count(&self) -> usize {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.state.probe_calls.load(Ordering::SeqCst)
    }

    pub fn api_count(&self) -> usize {
        self.state.api_calls.load(Ordering::SeqCst)
    }

    pub fn last_token_form(&self) -> Option<HashMap<String, String>> {
        self.state.forms.lock().unwrap().last().cloned()
    }

    /// Make the API reject an access token from now on.
    pub fn revoke(&self, access_token: &str) {
        self.state
            .revoked
            .lock()
            .unwrap()
            .insert(access_token.to_string());
    }
}

impl Drop for MockGoogle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn token_handler(
    State(state): State<Arc<MockState>>,
    axum::Form(form): axum::Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let n = state.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    state.forms.lock().unwrap().push(form.clone());

    let invalid_grant = (
        StatusCode::BAD_REQUEST,
        axum::Json(serde_json::json!({"error": "invalid_grant"})),
    );

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") if form.get("code").map(String::as_str) == Some("good-code") => (
            StatusCode::OK,
            axum::Json(serde_json::json!({
                "access_token": format!("at_issued_{n}"),
                "refresh_token": "rt_valid_issued",
                "expires_in": 3599,
                "scope": crate::constants::YOUTUBE_SCOPE,
                "token_type": "Bearer",
            })),
        ),
        Some("refresh_token")
            if form
                .get("refresh_token")
                .is_some_and(|t| t.starts_with("rt_valid")) =>
        {
            (
                StatusCode::OK,
                axum::Json(serde_json::json!({
                    "access_token": format!("at_refreshed_{n}"),
                    "expires_in": 3599,
                    "token_type": "Bearer",
                })),
            )
        }
        _ => invalid_grant,
    }
}

async fn probe_handler(State(state): State<Arc<MockState>>, headers: HeaderMap) -> impl IntoResponse {
    state.probe_calls.fetch_add(1, Ordering::SeqCst);
    if state.accepts(&headers) {
        (
            StatusCode::OK,
            axum::Json(serde_json::json!({"items": [{"id": "UC_test"}]})),
        )
    } else {
        (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({"error": {"code": 401}})),
        )
    }
}

async fn playlists_handler(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.api_calls.fetch_add(1, Ordering::SeqCst);
    if state.accepts(&headers) {
        (StatusCode::OK, axum::Json(serde_json::json!({"items": []})))
    } else {
        (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({"error": {"code": 401}})),
        )
    }
}

/// One request the fake browser sends to the redirect URI.
#[derive(Debug, Clone, Copy)]
pub enum Callback {
    /// No code parameter
    Malformed,
    /// Valid code, forged state
    WrongState,
    /// `code=good-code` with the flow's state
    Valid,
}

/// Browser stand-in that records the consent URL and replays a scripted
/// sequence of callback requests against its redirect URI.
pub struct CallbackBrowser {
    script: Vec<Callback>,
    opened: Mutex<Vec<String>>,
}

impl CallbackBrowser {
    pub fn new(script: Vec<Callback>) -> Arc<Self> {
        Arc::new(Self {
            script,
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    /// Query parameters of the most recently opened URL.
    pub fn last_params(&self) -> HashMap<String, String> {
        let url = self.opened().last().cloned().unwrap();
        reqwest::Url::parse(&url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect()
    }
}

impl BrowserLauncher for CallbackBrowser {
    fn open(&self, url: &str) -> io::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());

        let params: HashMap<String, String> = reqwest::Url::parse(url)
            .unwrap()
            .query_pairs()
            .into_owned()
            .collect();
        let redirect = params["redirect_uri"].clone();
        let state = params["state"].clone();
        let script = self.script.clone();

        tokio::spawn(async move {
            let client = reqwest::Client::new();
            for step in script {
                let target = match step {
                    Callback::Malformed => format!("{redirect}?foo=bar"),
                    Callback::WrongState => format!("{redirect}?code=good-code&state=forged"),
                    Callback::Valid => format!("{redirect}?code=good-code&state={state}"),
                };
                let _ = client.get(target).send().await;
            }
        });
        Ok(())
    }
}
