//! Error types for credential acquisition and token management

use std::time::Duration;

/// Errors from OAuth credential operations.
///
/// `TokenRejected` is the expected outcome when a stored token has been
/// revoked; the credential manager recovers from it by falling back to the
/// interactive flow. The remaining variants are surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no OAuth callback received within {0:?}")]
    AuthTimeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("token rejected: {0}")]
    TokenRejected(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// A broken internal invariant, such as the acquisition state machine
    /// stopping outside `Authorized`.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
