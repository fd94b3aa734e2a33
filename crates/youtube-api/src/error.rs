//! Error types for YouTube API operations

/// Errors from playlist operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] youtube_auth::Error),

    #[error("YouTube API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("invalid API response: {0}")]
    Decode(String),
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;
