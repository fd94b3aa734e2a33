//! Authorized handle for API calls
//!
//! Attaches the current access token to outgoing requests. When the token
//! is about to expire, or the API answers 401 mid-session, the handle
//! refreshes it, notifies every registered `RefreshListener` inline, and
//! replays the request once.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::client_secrets::ClientSecrets;
use crate::constants::REFRESH_THRESHOLD_MILLIS;
use crate::credentials::{StoredCredential, TokenFile, now_millis};
use crate::error::{Error, Result};
use crate::token;

/// Observer for mid-session token refreshes.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn RefreshListener>`). The handle awaits each listener before the
/// refreshed request is sent.
pub trait RefreshListener: Send + Sync {
    fn on_credentials_refreshed<'a>(
        &'a self,
        credential: &'a StoredCredential,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>;
}

/// The token file persists every refreshed record so the next invocation
/// starts from it.
impl RefreshListener for TokenFile {
    fn on_credentials_refreshed<'a>(
        &'a self,
        credential: &'a StoredCredential,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if let Err(e) = self.save(credential).await {
                warn!(path = %self.path().display(), error = %e, "failed to persist refreshed token");
            }
        })
    }
}

struct Inner {
    http: reqwest::Client,
    token_endpoint: String,
    secrets: ClientSecrets,
    credential: RwLock<StoredCredential>,
    listeners: RwLock<Vec<Arc<dyn RefreshListener>>>,
    /// Serializes refreshes so concurrent 401s trigger one exchange
    refresh_lock: Mutex<()>,
}

/// Runtime handle bound to a verified access token. Cheap to clone.
#[derive(Clone)]
pub struct AuthorizedClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("token_endpoint", &self.inner.token_endpoint)
            .field("client_id", &self.inner.secrets.client_id)
            .finish_non_exhaustive()
    }
}

impl AuthorizedClient {
    pub fn new(
        http: reqwest::Client,
        token_endpoint: impl Into<String>,
        secrets: ClientSecrets,
        credential: StoredCredential,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                token_endpoint: token_endpoint.into(),
                secrets,
                credential: RwLock::new(credential),
                listeners: RwLock::new(Vec::new()),
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    /// Register a listener called after every successful refresh, in
    /// registration order.
    pub async fn on_credentials_refreshed(&self, listener: Arc<dyn RefreshListener>) {
        self.inner.listeners.write().await.push(listener);
    }

    /// Snapshot of the current record.
    pub async fn credential(&self) -> StoredCredential {
        self.inner.credential.read().await.clone()
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.inner.http
    }

    /// Send a request with the current bearer token.
    ///
    /// `build` is called once per attempt, so it must be able to produce the
    /// same request twice. Non-2xx responses are returned to the caller,
    /// except a 401 that a refresh resolves.
    pub async fn execute<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let current = self.credential().await;
        let current = if current.can_refresh()
            && current.expires_within(now_millis(), REFRESH_THRESHOLD_MILLIS)
        {
            debug!("access token expiring soon, refreshing before request");
            match self.refresh_from(&current).await {
                Ok(refreshed) => refreshed,
                Err(e) => {
                    warn!(error = %e, "early refresh failed, sending with current token");
                    current
                }
            }
        } else {
            current
        };

        let response = self.send(&build, &current.access_token).await?;
        if response.status() != reqwest::StatusCode::UNAUTHORIZED || !current.can_refresh() {
            return Ok(response);
        }

        info!("access token rejected mid-session, refreshing");
        let refreshed = self.refresh_from(&current).await?;
        self.send(&build, &refreshed.access_token).await
    }

    /// Refresh now, regardless of expiry.
    pub async fn refresh(&self) -> Result<StoredCredential> {
        let current = self.credential().await;
        self.refresh_from(&current).await
    }

    async fn send<F>(&self, build: &F, access_token: &str) -> Result<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        build(&self.inner.http)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Network(format!("API request failed: {e}")))
    }

    /// Exchange the refresh token of `stale` unless another caller already
    /// replaced it while we waited for the lock.
    async fn refresh_from(&self, stale: &StoredCredential) -> Result<StoredCredential> {
        let _guard = self.inner.refresh_lock.lock().await;

        let current = self.credential().await;
        if current.access_token != stale.access_token {
            debug!("token already refreshed by a concurrent request");
            return Ok(current);
        }

        let refresh = current.refresh_token.as_deref().ok_or_else(|| {
            Error::TokenRejected("access token expired and no refresh token is stored".into())
        })?;

        let response = token::refresh_token(
            &self.inner.http,
            &self.inner.token_endpoint,
            &self.inner.secrets,
            refresh,
        )
        .await?;
        let refreshed = StoredCredential::from_token_response(response, now_millis(), Some(&current));

        *self.inner.credential.write().await = refreshed.clone();
        info!(expiry_date = ?refreshed.expiry_date, "mid-session token refresh succeeded");

        let listeners = self.inner.listeners.read().await.clone();
        for listener in listeners {
            listener.on_credentials_refreshed(&refreshed).await;
        }

        Ok(refreshed)
    }
}
