//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! A config file is optional: when the default path does not exist every
//! setting falls back to its default.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use youtube_auth::{
    API_BASE_URL, AUTHORIZE_ENDPOINT, AuthConfig, CALLBACK_TIMEOUT_SECS, TOKEN_ENDPOINT,
};

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "yt-playlist.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub api: ApiSection,
}

/// OAuth client and token settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSection {
    #[serde(default = "default_client_secrets_path")]
    pub client_secrets_path: PathBuf,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    #[serde(default = "default_callback_timeout")]
    pub callback_timeout_secs: u64,
    /// Print the consent URL instead of launching a browser when false
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
    /// Replaces the first redirect URI from the client secrets file;
    /// port 0 picks a free port
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

/// YouTube Data API settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiSection {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            client_secrets_path: default_client_secrets_path(),
            token_path: default_token_path(),
            authorize_endpoint: default_authorize_endpoint(),
            token_endpoint: default_token_endpoint(),
            callback_timeout_secs: default_callback_timeout(),
            open_browser: default_open_browser(),
            redirect_uri: None,
        }
    }
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_client_secrets_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from("token.json")
}

fn default_authorize_endpoint() -> String {
    AUTHORIZE_ENDPOINT.to_string()
}

fn default_token_endpoint() -> String {
    TOKEN_ENDPOINT.to_string()
}

fn default_callback_timeout() -> u64 {
    CALLBACK_TIMEOUT_SECS
}

fn default_open_browser() -> bool {
    true
}

fn default_api_base_url() -> String {
    API_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.finish()
    }

    /// Like `load`, but a missing file yields the defaults.
    ///
    /// Only used for the implicit default path; an explicitly named file
    /// that does not exist is an error.
    pub fn load_or_default(path: &Path) -> common::Result<Self> {
        if !path.exists() {
            return Config::default().finish();
        }
        Self::load(path)
    }

    fn finish(mut self) -> common::Result<Self> {
        self.apply_env();
        self.validate()?;
        Ok(self)
    }

    fn apply_env(&mut self) {
        if let Some(path) = non_empty_env("YT_CLIENT_SECRETS") {
            self.auth.client_secrets_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("YT_TOKEN_FILE") {
            self.auth.token_path = PathBuf::from(path);
        }
    }

    fn validate(&self) -> common::Result<()> {
        for (name, url) in [
            ("auth.authorize_endpoint", &self.auth.authorize_endpoint),
            ("auth.token_endpoint", &self.auth.token_endpoint),
            ("api.base_url", &self.api.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if let Some(uri) = self
            .auth
            .redirect_uri
            .as_deref()
            .filter(|uri| !uri.starts_with("http://"))
        {
            return Err(common::Error::Config(format!(
                "auth.redirect_uri must be a loopback http:// URL, got: {uri}"
            )));
        }

        if self.auth.callback_timeout_secs == 0 {
            return Err(common::Error::Config(
                "callback_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Credential manager settings derived from this config.
    pub fn auth_config(&self) -> AuthConfig {
        let mut auth = AuthConfig::new(
            self.auth.client_secrets_path.clone(),
            self.auth.token_path.clone(),
        );
        auth.authorize_endpoint = self.auth.authorize_endpoint.clone();
        auth.token_endpoint = self.auth.token_endpoint.clone();
        auth.api_base_url = self.api.base_url.clone();
        auth.callback_timeout = Duration::from_secs(self.auth.callback_timeout_secs);
        auth.redirect_uri = self.auth.redirect_uri.clone();
        auth
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    ///
    /// The flag is true when the path was named explicitly.
    pub fn resolve_path(cli_path: Option<&Path>) -> (PathBuf, bool) {
        if let Some(p) = cli_path {
            return (p.to_path_buf(), true);
        }
        if let Some(p) = non_empty_env("CONFIG_PATH") {
            return (PathBuf::from(p), true);
        }
        (PathBuf::from(DEFAULT_CONFIG_FILE), false)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
