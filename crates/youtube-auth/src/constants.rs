//! Google OAuth and YouTube Data API defaults
//!
//! These are the endpoints used when the configuration does not override
//! them. None of them are secrets; the client id and secret come from the
//! client secrets file downloaded from the Google Cloud console.

/// Authorization endpoint for the installed-app consent screen
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Base URL of the YouTube Data API v3
pub const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Full read/write access to the user's YouTube account.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

/// Redirect target used when the client secrets file lists none.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080";

/// How long the local listener waits for the browser callback.
pub const CALLBACK_TIMEOUT_SECS: u64 = 120;

/// Tokens expiring within this window are refreshed before a request is sent.
pub const REFRESH_THRESHOLD_MILLIS: u64 = 60_000;
