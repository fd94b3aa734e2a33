//! Playlist operations over the YouTube Data API v3
//!
//! `YouTube` wraps an `AuthorizedClient` from `youtube-auth`, so every call
//! carries a verified bearer token and survives a mid-session expiry. The
//! output types serialize to the JSON the `yt-playlist` CLI prints.

pub mod client;
pub mod error;
pub mod types;

pub use client::YouTube;
pub use error::{Error, Result};
pub use types::{
    BulkCreateResult, CreatedPlaylist, FailedVideo, PlaylistSummary, Privacy, Subscription, VideoEntry,
    extract_video_id, playlist_url,
};
