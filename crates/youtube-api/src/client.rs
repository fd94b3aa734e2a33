//! YouTube Data API client for playlist operations

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};
use youtube_auth::AuthorizedClient;

use crate::error::{Error, Result};
use crate::types::{
    BulkCreateResult, CreatedPlaylist, FailedVideo, PlaylistSummary, Privacy, Subscription,
    VideoEntry, playlist_url,
};

/// Page size used when searching a playlist for the item to remove.
const REMOVE_SEARCH_PAGE: u32 = 50;

/// Playlist operations bound to one authorized handle.
pub struct YouTube {
    client: AuthorizedClient,
    base_url: String,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistResource {
    id: String,
    snippet: Snippet,
    #[serde(default)]
    content_details: Option<ContentDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    #[serde(default)]
    item_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemResource {
    #[serde(default)]
    id: String,
    snippet: Snippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    channel_title: Option<String>,
    #[serde(default)]
    video_owner_channel_title: Option<String>,
    #[serde(default)]
    resource_id: Option<ResourceId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

impl YouTube {
    pub fn new(client: AuthorizedClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a playlist.
    pub async fn create_playlist(
        &self,
        title: &str,
        description: &str,
        privacy: Privacy,
    ) -> Result<CreatedPlaylist> {
        let body = json!({
            "snippet": { "title": title, "description": description },
            "status": { "privacyStatus": privacy.as_str() },
        });
        let created: Created = self
            .post_json("playlists", &[("part", "snippet,status")], &body)
            .await?;
        info!(playlist_id = %created.id, %privacy, "playlist created");
        Ok(CreatedPlaylist {
            url: playlist_url(&created.id),
            id: created.id,
            title: title.to_string(),
        })
    }

    /// Append a video to a playlist.
    pub async fn add_video(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        let body = json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": { "kind": "youtube#video", "videoId": video_id },
            }
        });
        let _: serde_json::Value = self
            .post_json("playlistItems", &[("part", "snippet")], &body)
            .await?;
        debug!(playlist_id, video_id, "video added");
        Ok(())
    }

    /// Create a playlist and add every video to it.
    ///
    /// A video that fails to add is recorded in `failed`; only failing to
    /// create the playlist aborts the operation.
    pub async fn bulk_create(
        &self,
        title: &str,
        video_ids: &[String],
        description: &str,
        privacy: Privacy,
    ) -> Result<BulkCreateResult> {
        let playlist = self.create_playlist(title, description, privacy).await?;

        let mut added = Vec::new();
        let mut failed = Vec::new();
        for video_id in video_ids {
            match self.add_video(&playlist.id, video_id).await {
                Ok(()) => added.push(video_id.clone()),
                Err(e) => {
                    warn!(video_id = %video_id, error = %e, "failed to add video");
                    failed.push(FailedVideo {
                        video_id: video_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            playlist_id = %playlist.id,
            added = added.len(),
            failed = failed.len(),
            "bulk create finished"
        );
        Ok(BulkCreateResult {
            playlist_id: playlist.id,
            url: playlist.url,
            added,
            failed,
        })
    }

    /// The caller's own playlists.
    pub async fn list_playlists(&self, max_results: u32) -> Result<Vec<PlaylistSummary>> {
        let max = max_results.to_string();
        let page: ListResponse<PlaylistResource> = self
            .get_json(
                "playlists",
                &[
                    ("part", "snippet,contentDetails"),
                    ("mine", "true"),
                    ("maxResults", &max),
                ],
            )
            .await?;

        Ok(page
            .items
            .into_iter()
            .map(|item| PlaylistSummary {
                url: playlist_url(&item.id),
                title: item.snippet.title,
                video_count: item.content_details.map(|d| d.item_count).unwrap_or(0),
                id: item.id,
            })
            .collect())
    }

    /// Remove the first occurrence of a video from a playlist.
    ///
    /// Only the first page of playlist items is searched.
    pub async fn remove_video(&self, playlist_id: &str, video_id: &str) -> Result<()> {
        let items = self
            .playlist_items(playlist_id, REMOVE_SEARCH_PAGE, "id,snippet")
            .await?;
        let item = items
            .into_iter()
            .find(|i| resource_video_id(&i.snippet) == Some(video_id))
            .ok_or_else(|| {
                Error::NotFound(format!("Video {video_id} not found in playlist {playlist_id}"))
            })?;

        self.delete("playlistItems", &[("id", item.id.as_str())])
            .await?;
        info!(playlist_id, video_id, "video removed");
        Ok(())
    }

    /// Videos in a playlist.
    pub async fn playlist_videos(&self, playlist_id: &str, max_results: u32) -> Result<Vec<VideoEntry>> {
        let items = self
            .playlist_items(playlist_id, max_results, "snippet")
            .await?;
        Ok(items
            .into_iter()
            .map(|item| VideoEntry {
                video_id: resource_video_id(&item.snippet).unwrap_or_default().to_string(),
                channel: item
                    .snippet
                    .video_owner_channel_title
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                title: item.snippet.title,
            })
            .collect())
    }

    /// Videos the caller has liked.
    pub async fn liked_videos(&self, max_results: u32) -> Result<Vec<VideoEntry>> {
        let max = max_results.to_string();
        let page: ListResponse<ItemResource> = self
            .get_json(
                "videos",
                &[("part", "snippet"), ("myRating", "like"), ("maxResults", &max)],
            )
            .await?;
        Ok(page
            .items
            .into_iter()
            .map(|item| VideoEntry {
                video_id: item.id,
                channel: item.snippet.channel_title.unwrap_or_default(),
                title: item.snippet.title,
            })
            .collect())
    }

    /// Channels the caller subscribes to.
    pub async fn subscriptions(&self, max_results: u32) -> Result<Vec<Subscription>> {
        let max = max_results.to_string();
        let page: ListResponse<ItemResource> = self
            .get_json(
                "subscriptions",
                &[("part", "snippet"), ("mine", "true"), ("maxResults", &max)],
            )
            .await?;
        Ok(page
            .items
            .into_iter()
            .map(|item| Subscription {
                channel_id: item
                    .snippet
                    .resource_id
                    .and_then(|r| r.channel_id)
                    .unwrap_or_default(),
                title: item.snippet.title,
            })
            .collect())
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
        part: &str,
    ) -> Result<Vec<ItemResource>> {
        let max = max_results.to_string();
        let page: ListResponse<ItemResource> = self
            .get_json(
                "playlistItems",
                &[
                    ("part", part),
                    ("playlistId", playlist_id),
                    ("maxResults", &max),
                ],
            )
            .await?;
        Ok(page.items)
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{resource}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(resource);
        let response = self
            .client
            .execute(|http| http.get(&url).query(query))
            .await?;
        decode(check(response).await?).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
        body: &serde_json::Value,
    ) -> Result<T> {
        let url = self.url(resource);
        let response = self
            .client
            .execute(|http| http.post(&url).query(query).json(body))
            .await?;
        decode(check(response).await?).await
    }

    async fn delete(&self, resource: &str, query: &[(&str, &str)]) -> Result<()> {
        let url = self.url(resource);
        let response = self
            .client
            .execute(|http| http.delete(&url).query(query))
            .await?;
        check(response).await?;
        Ok(())
    }
}

fn resource_video_id(snippet: &Snippet) -> Option<&str> {
    snippet
        .resource_id
        .as_ref()
        .and_then(|r| r.video_id.as_deref())
}

/// Turn a non-2xx response into `Error::Api`, using Google's error message
/// when the body carries one.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(body);

    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| Error::Decode(e.to_string()))
}
