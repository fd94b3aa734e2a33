//! Credential manager configuration
//!
//! Everything the manager needs is passed in explicitly; nothing in this
//! crate reads environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    API_BASE_URL, AUTHORIZE_ENDPOINT, CALLBACK_TIMEOUT_SECS, TOKEN_ENDPOINT, YOUTUBE_SCOPE,
};

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Client secrets JSON from the Google Cloud console (read-only)
    pub client_secrets_path: PathBuf,
    /// Stored credential record (read and overwritten)
    pub token_path: PathBuf,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    /// API base used for the capability probe
    pub api_base_url: String,
    pub scopes: Vec<String>,
    /// Hard bound on the wait for the browser callback
    pub callback_timeout: Duration,
    /// Replaces the first redirect URI from the client secrets when set
    pub redirect_uri: Option<String>,
}

impl AuthConfig {
    /// Configuration with Google's production endpoints and the full
    /// YouTube scope.
    pub fn new(client_secrets_path: PathBuf, token_path: PathBuf) -> Self {
        Self {
            client_secrets_path,
            token_path,
            authorize_endpoint: AUTHORIZE_ENDPOINT.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            api_base_url: API_BASE_URL.to_string(),
            scopes: vec![YOUTUBE_SCOPE.to_string()],
            callback_timeout: Duration::from_secs(CALLBACK_TIMEOUT_SECS),
            redirect_uri: None,
        }
    }
}
