//! Playlist subcommands and their JSON output

use serde_json::{Value, json};
use tracing::info;
use youtube_api::{YouTube, extract_video_id};

use crate::cli::Command;

/// Output of the `auth` subcommand.
pub fn auth_ok() -> Value {
    json!({"status": "ok", "message": "Authenticated. Token saved."})
}

/// Run one playlist command and shape its result for stdout.
pub async fn execute(command: Command, yt: &YouTube) -> anyhow::Result<Value> {
    let value = match command {
        Command::Auth => auth_ok(),
        Command::Create {
            title,
            description,
            privacy,
        } => serde_json::to_value(yt.create_playlist(&title, &description, privacy).await?)?,
        Command::Add { playlist_id, video } => {
            let video_id = extract_video_id(&video);
            yt.add_video(&playlist_id, video_id).await?;
            json!({"status": "ok", "videoId": video_id, "playlistId": playlist_id})
        }
        Command::BulkCreate {
            title,
            videos,
            description,
            privacy,
        } => {
            let ids: Vec<String> = videos
                .iter()
                .map(|v| extract_video_id(v).to_string())
                .collect();
            serde_json::to_value(yt.bulk_create(&title, &ids, &description, privacy).await?)?
        }
        Command::List { max } => serde_json::to_value(yt.list_playlists(max).await?)?,
        Command::Remove { playlist_id, video } => {
            let video_id = extract_video_id(&video);
            yt.remove_video(&playlist_id, video_id).await?;
            json!({"status": "ok", "videoId": video_id})
        }
        Command::Videos { playlist_id, max } => {
            serde_json::to_value(yt.playlist_videos(&playlist_id, max).await?)?
        }
        Command::Liked { max } => serde_json::to_value(yt.liked_videos(max).await?)?,
        Command::Subscriptions { max } => serde_json::to_value(yt.subscriptions(max).await?)?,
    };
    info!("command completed");
    Ok(value)
}

/// Error object printed on stdout when a command fails.
pub fn error_output(err: &anyhow::Error) -> Value {
    json!({"error": format!("{err:#}")})
}

/// Error object for a rejected command line, or `None` for `--help` and
/// `--version`, which clap prints and exits on itself.
pub fn usage_error_output(err: &clap::Error) -> Option<Value> {
    use clap::error::ErrorKind;

    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => None,
        _ => {
            let text = err.to_string();
            let message = text.trim().trim_start_matches("error: ");
            Some(json!({"error": message}))
        }
    }
}
