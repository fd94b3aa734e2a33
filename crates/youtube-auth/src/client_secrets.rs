//! OAuth client application credentials
//!
//! Reads the client secrets JSON downloaded from the Google Cloud console.
//! Installed-app clients put their fields under `installed`, web clients
//! under `web`; either is accepted. The file is never written.

use std::path::Path;

use common::Secret;
use serde::Deserialize;
use tracing::debug;

use crate::constants::DEFAULT_REDIRECT_URI;
use crate::error::{Error, Result};

/// Static identity of the OAuth client application.
#[derive(Debug, Clone)]
pub struct ClientSecrets {
    pub client_id: String,
    /// Absent for public clients that rely on PKCE alone
    pub client_secret: Option<Secret<String>>,
    /// First redirect URI from the file, or `DEFAULT_REDIRECT_URI`
    pub redirect_uri: String,
}

#[derive(Deserialize)]
struct SecretsFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<Secret<String>>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl ClientSecrets {
    /// Load and validate the client secrets file.
    ///
    /// Every failure here is a `Configuration` error: the operator has to
    /// fix the local setup before any flow can succeed.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Configuration(format!(
                "client secrets not readable at {}: {e} (download OAuth credentials from the Google Cloud console)",
                path.display()
            ))
        })?;
        let secrets = Self::parse(&contents)?;
        debug!(path = %path.display(), client_id = %secrets.client_id, "loaded client secrets");
        Ok(secrets)
    }

    /// Parse client secrets from a JSON string.
    pub fn parse(contents: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(contents)
            .map_err(|e| Error::Configuration(format!("invalid client secrets JSON: {e}")))?;

        let section = file
            .installed
            .or(file.web)
            .ok_or_else(|| Error::Configuration("client secrets missing client_id".into()))?;

        let client_id = section
            .client_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| Error::Configuration("client secrets missing client_id".into()))?;

        let redirect_uri = section
            .redirect_uris
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        Ok(Self {
            client_id,
            client_secret: section.client_secret.filter(|s| !s.is_blank()),
            redirect_uri,
        })
    }
}
