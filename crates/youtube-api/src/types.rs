//! Operation inputs and outputs

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Playlist visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    Private,
    Unlisted,
    Public,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Private => "private",
            Privacy::Unlisted => "unlisted",
            Privacy::Public => "public",
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privacy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Privacy::Private),
            "unlisted" => Ok(Privacy::Unlisted),
            "public" => Ok(Privacy::Public),
            other => Err(format!(
                "invalid privacy '{other}', expected private, unlisted or public"
            )),
        }
    }
}

/// Pull a video id out of a watch URL, a short link, or return the input
/// unchanged when it already is an id.
pub fn extract_video_id(input: &str) -> &str {
    if !input.contains("youtube.com") && !input.contains("youtu.be") {
        return input;
    }
    if let Some((_, rest)) = input.split_once("v=") {
        return rest.split('&').next().unwrap_or(rest);
    }
    if let Some((_, rest)) = input.split_once("youtu.be/") {
        return rest.split('?').next().unwrap_or(rest);
    }
    input
}

pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://youtube.com/playlist?list={playlist_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPlaylist {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedVideo {
    pub video_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateResult {
    pub playlist_id: String,
    pub url: String,
    pub added: Vec<String>,
    pub failed: Vec<FailedVideo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub id: String,
    pub title: String,
    pub video_count: u64,
    pub url: String,
}

/// A video in a playlist or in the liked list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry {
    pub title: String,
    pub video_id: String,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub title: String,
    pub channel_id: String,
}
