//! Credential manager: produces an authorized handle for one CLI invocation
//!
//! Drives the state machine in `machine` against the real world: the token
//! file, the token endpoint, the capability probe and, when nothing cheaper
//! works, the browser consent flow with its local callback listener.
//!
//! Failures while reusing a stored token (probe failure, rejected refresh)
//! are recovered by falling back to the browser flow. Failures of the
//! browser flow itself, bad local configuration, and an unreachable token
//! endpoint are returned to the caller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::browser::{BrowserLauncher, SystemBrowser};
use crate::callback::CallbackServer;
use crate::client_secrets::ClientSecrets;
use crate::config::AuthConfig;
use crate::credentials::{StoredCredential, TokenFile, now_millis};
use crate::error::{Error, Result};
use crate::handle::AuthorizedClient;
use crate::machine::{AuthAction, AuthEvent, AuthState, handle_event};
use crate::pkce::{self, AuthorizationRequest};
use crate::token;

pub struct CredentialManager {
    config: AuthConfig,
    http: reqwest::Client,
    store: Arc<TokenFile>,
    launcher: Arc<dyn BrowserLauncher>,
}

impl CredentialManager {
    pub fn new(config: AuthConfig, http: reqwest::Client) -> Self {
        let store = Arc::new(TokenFile::new(config.token_path.clone()));
        Self {
            config,
            http,
            store,
            launcher: Arc::new(SystemBrowser),
        }
    }

    /// Replace how the consent URL is presented (default: system browser).
    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn token_file(&self) -> &TokenFile {
        &self.store
    }

    /// Produce a handle bound to a verified access token.
    ///
    /// The returned handle has the token file registered as a refresh
    /// listener, so refreshes later in the session are persisted too.
    pub async fn acquire(&self) -> Result<AuthorizedClient> {
        let secrets = ClientSecrets::load(&self.config.client_secrets_path).await?;

        let record = match self.store.load().await {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "stored credential unreadable, browser authorization required");
                None
            }
        };

        let (mut state, mut action) =
            handle_event(AuthState::NoToken, AuthEvent::RecordLoaded(record));

        loop {
            debug!(state = state.label(), "credential state");
            let event = match action {
                AuthAction::CheckExpiry => AuthEvent::ClockRead {
                    now_millis: now_millis(),
                },
                AuthAction::Refresh { refresh_token } => {
                    let previous = match &state {
                        AuthState::TokenExpiredRefreshable(record) => Some(record),
                        _ => None,
                    };
                    self.refresh_stored(&secrets, previous, &refresh_token)
                        .await?
                }
                AuthAction::Probe { access_token } => {
                    match token::probe(&self.http, &self.config.api_base_url, &access_token).await
                    {
                        Ok(()) => AuthEvent::ProbePassed,
                        Err(e) => {
                            warn!(error = %e, "stored token failed verification");
                            AuthEvent::ProbeFailed
                        }
                    }
                }
                AuthAction::StartInteractive => {
                    AuthEvent::CodeExchanged(self.authorize_interactively(&secrets).await?)
                }
                AuthAction::Finish => break,
                AuthAction::None => return Err(stalled(&state)),
            };
            (state, action) = handle_event(state, event);
        }

        let credential = into_authorized(state)?;

        let client = AuthorizedClient::new(
            self.http.clone(),
            self.config.token_endpoint.clone(),
            secrets,
            credential,
        );
        client.on_credentials_refreshed(self.store.clone()).await;
        info!("credentials ready");
        Ok(client)
    }

    /// Refresh a stale stored token and persist the result.
    ///
    /// A rejected refresh token becomes `RefreshRejected`; a transport
    /// failure is returned as `Network`.
    async fn refresh_stored(
        &self,
        secrets: &ClientSecrets,
        previous: Option<&StoredCredential>,
        refresh_token: &str,
    ) -> Result<AuthEvent> {
        match token::refresh_token(
            &self.http,
            &self.config.token_endpoint,
            secrets,
            refresh_token,
        )
        .await
        {
            Ok(response) => {
                let record = StoredCredential::from_token_response(response, now_millis(), previous);
                if let Err(e) = self.store.save(&record).await {
                    warn!(error = %e, "failed to persist refreshed token");
                }
                info!("stored token refreshed");
                Ok(AuthEvent::Refreshed(record))
            }
            Err(Error::Network(msg)) => Err(Error::Network(msg)),
            Err(e) => {
                warn!(error = %e, "refresh failed, falling back to browser authorization");
                Ok(AuthEvent::RefreshRejected)
            }
        }
    }

    /// Browser consent flow: listen, open the URL, wait for the code,
    /// exchange it, persist the new record.
    async fn authorize_interactively(&self, secrets: &ClientSecrets) -> Result<StoredCredential> {
        let redirect = self
            .config
            .redirect_uri
            .as_deref()
            .unwrap_or(&secrets.redirect_uri);

        let state = pkce::generate_state();
        let verifier = pkce::generate_verifier();
        let challenge = pkce::compute_challenge(&verifier);

        let server = CallbackServer::start(redirect, state.clone()).await?;
        let redirect_uri = server.redirect_uri().to_string();
        let scope = self.config.scopes.join(" ");

        let url = pkce::build_authorization_url(&AuthorizationRequest {
            authorize_endpoint: &self.config.authorize_endpoint,
            client_id: &secrets.client_id,
            redirect_uri: &redirect_uri,
            scope: &scope,
            challenge: &challenge,
            state: &state,
        })?;

        info!(redirect_uri = %redirect_uri, "browser authorization required");
        eprintln!("Waiting for OAuth callback on {redirect_uri} ...");
        if let Err(e) = self.launcher.open(&url) {
            warn!(error = %e, "could not open a browser");
            eprintln!("Open this URL in a browser to authorize access:\n\n  {url}\n");
        }

        let code = server.wait_for_code(self.config.callback_timeout).await?;

        let response = token::exchange_code(
            &self.http,
            &self.config.token_endpoint,
            secrets,
            &code,
            &verifier,
            &redirect_uri,
        )
        .await?;
        let record = StoredCredential::from_token_response(response, now_millis(), None);
        if !record.can_refresh() {
            warn!("no refresh token granted, the next expiry will need browser authorization");
        }

        self.store.save(&record).await?;
        info!(path = %self.store.path().display(), "authorization complete, token saved");
        Ok(record)
    }
}

fn stalled(state: &AuthState) -> Error {
    Error::Internal(format!(
        "credential state machine stalled in {}",
        state.label()
    ))
}

/// The credential of a finished run; any other final state is a bug.
fn into_authorized(state: AuthState) -> Result<StoredCredential> {
    match state {
        AuthState::Authorized(credential) => Ok(credential),
        other => Err(Error::Internal(format!(
            "credential state machine finished in {}",
            other.label()
        ))),
    }
}
