//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use youtube_api::Privacy;

#[derive(Debug, Parser)]
#[command(
    name = "yt-playlist",
    about = "Manage YouTube playlists from the command line (JSON output)",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Config file (default: $CONFIG_PATH, then ./yt-playlist.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the OAuth consent flow (or confirm the stored token still works)
    Auth,

    /// Create an empty playlist
    Create {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// private | unlisted | public
        #[arg(long, default_value = "private")]
        privacy: Privacy,
    },

    /// Add a video (id or URL) to a playlist
    Add { playlist_id: String, video: String },

    /// Create a playlist and add several videos to it
    BulkCreate {
        title: String,
        #[arg(required = true, num_args = 1..)]
        videos: Vec<String>,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "unlisted")]
        privacy: Privacy,
    },

    /// List your playlists
    List {
        #[arg(long, default_value_t = 25)]
        max: u32,
    },

    /// Remove a video (id or URL) from a playlist
    Remove { playlist_id: String, video: String },

    /// List the videos in a playlist
    Videos {
        playlist_id: String,
        #[arg(long, default_value_t = 50)]
        max: u32,
    },

    /// List videos you have liked
    Liked {
        #[arg(long, default_value_t = 50)]
        max: u32,
    },

    /// List channels you subscribe to
    Subscriptions {
        #[arg(long, default_value_t = 50)]
        max: u32,
    },
}
