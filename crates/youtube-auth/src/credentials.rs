//! Stored credential record and its token file
//!
//! The token file holds exactly one JSON record and is overwritten in place.
//! Writes use temp-file + rename so a crash mid-write never leaves a
//! truncated file behind, and the file is created with mode 0600 because it
//! carries bearer tokens.
//!
//! There is no cross-process lock. Two invocations refreshing at the same
//! time both write, and the last rename wins. Within one process the writes
//! are serialized by a Mutex.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::token::TokenResponse;

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The persisted access/refresh token set.
///
/// Field names follow the token file layout written by Google's client
/// libraries, so an existing `token.json` keeps working.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    #[serde(default)]
    pub access_token: String,
    /// Only present when the server granted offline access
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Absolute expiry as unix milliseconds. Advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<u64>,
    /// Space-delimited granted scopes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl StoredCredential {
    /// Build a record from a token endpoint response received at `now_millis`.
    ///
    /// Refresh responses usually omit `refresh_token`; in that case the one
    /// from `previous` is carried forward so the record stays renewable.
    pub fn from_token_response(
        response: TokenResponse,
        now_millis: u64,
        previous: Option<&StoredCredential>,
    ) -> Self {
        let refresh_token = response
            .refresh_token
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));
        let scope = response
            .scope
            .or_else(|| previous.and_then(|p| p.scope.clone()));

        Self {
            access_token: response.access_token,
            refresh_token,
            expiry_date: response
                .expires_in
                .map(|secs| now_millis.saturating_add(secs.saturating_mul(1000))),
            scope,
            token_type: response.token_type,
        }
    }

    /// Whether a refresh token is available for silent renewal.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Whether the recorded expiry is at or before `now_millis`.
    /// A record without an expiry is never considered expired.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expires_within(now_millis, 0)
    }

    /// Whether the recorded expiry falls within `window_millis` of `now_millis`.
    pub fn expires_within(&self, now_millis: u64, window_millis: u64) -> bool {
        self.expiry_date
            .is_some_and(|expiry| expiry <= now_millis.saturating_add(window_millis))
    }

    /// Granted scopes as individual strings.
    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.as_deref().unwrap_or("").split_whitespace()
    }
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry_date", &self.expiry_date)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Single-record credential file.
pub struct TokenFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl TokenFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored record.
    ///
    /// Returns `Ok(None)` when no file exists (first run). A file that exists
    /// but cannot be parsed is a `CredentialParse` error; the caller decides
    /// whether that means re-authorization.
    pub async fn load(&self) -> Result<Option<StoredCredential>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no stored credential");
                return Ok(None);
            }
            Err(e) => return Err(Error::Io(format!("reading token file: {e}"))),
        };

        let credential: StoredCredential = serde_json::from_str(&contents)
            .map_err(|e| Error::CredentialParse(format!("parsing token file: {e}")))?;
        debug!(
            path = %self.path.display(),
            refreshable = credential.can_refresh(),
            expiry_date = ?credential.expiry_date,
            "loaded stored credential"
        );
        Ok(Some(credential))
    }

    /// Overwrite the stored record.
    pub async fn save(&self, credential: &StoredCredential) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.path, credential).await
    }
}

/// Write the record to a sibling temp file, then rename it over `path`.
async fn write_atomic(path: &Path, credential: &StoredCredential) -> Result<()> {
    let json = serde_json::to_string_pretty(credential)
        .map_err(|e| Error::CredentialParse(format!("serializing credential: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| Error::Io(format!("creating token directory: {e}")))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("token.json");
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}
