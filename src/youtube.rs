//! Minimal YouTube Data API v3 client covering the three read endpoints the
//! service needs.

use axum::http::header;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

pub const DEFAULT_PLAYLIST_PARTS: &str = "snippet,status,contentDetails";
pub const DEFAULT_PAGE_SIZE: u32 = 25;
pub const MAX_PAGE_SIZE: u32 = 50;
pub const DEFAULT_ITEMS_PAGE_SIZE: u32 = 50;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("invalid API base URL {0}")]
    BaseUrl(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("playlist {0} not found")]
    PlaylistNotFound(String),
}

impl ClientError {
    /// Whether the upstream reported the resource as absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::PlaylistNotFound(_))
            || matches!(self, ClientError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub total_results: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistListResponse {
    pub next_page_token: Option<String>,
    pub prev_page_token: Option<String>,
    pub page_info: PageInfo,
    pub items: Vec<Playlist>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Playlist {
    pub id: String,
    pub snippet: PlaylistSnippet,
    pub status: PlaylistStatus,
    pub content_details: PlaylistContentDetails,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistSnippet {
    pub published_at: String,
    pub title: String,
    pub description: String,
    pub thumbnails: HashMap<String, Thumbnail>,
    pub channel_title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistStatus {
    pub privacy_status: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistContentDetails {
    pub item_count: u32,
}

/// One page of playlist items. Only the first page is ever requested.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaylistItemListResponse {
    pub items: Vec<PlaylistItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PlaylistItem {
    pub snippet: PlaylistItemSnippet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaylistItemSnippet {
    pub published_at: String,
    pub title: String,
    pub description: String,
    pub thumbnails: HashMap<String, Thumbnail>,
    pub channel_title: String,
    pub position: u32,
    pub resource_id: ResourceId,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceId {
    pub video_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListPlaylistsOptions {
    pub part: String,
    pub mine: bool,
    pub channel_id: Option<String>,
    /// `0` selects the default page size; larger values are capped at 50.
    pub max_results: u32,
    pub page_token: Option<String>,
}

impl ListPlaylistsOptions {
    pub fn mine(max_results: u32, page_token: Option<String>) -> Self {
        Self {
            part: DEFAULT_PLAYLIST_PARTS.to_string(),
            mine: true,
            channel_id: None,
            max_results,
            page_token,
        }
    }
}

/// Client bound to a single caller's access token.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl YouTubeClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    pub async fn list_playlists(
        &self,
        options: &ListPlaylistsOptions,
    ) -> ClientResult<PlaylistListResponse> {
        let url = self.playlists_url(options)?;
        self.get_json(url).await
    }

    pub async fn get_playlist_by_id(&self, playlist_id: &str) -> ClientResult<Playlist> {
        let url = self.endpoint(
            "playlists",
            &[("part", DEFAULT_PLAYLIST_PARTS), ("id", playlist_id)],
        )?;

        let response: PlaylistListResponse = self.get_json(url).await?;
        response
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::PlaylistNotFound(playlist_id.to_string()))
    }

    pub async fn list_playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
    ) -> ClientResult<PlaylistItemListResponse> {
        let url = self.playlist_items_url(playlist_id, max_results)?;
        self.get_json(url).await
    }

    fn playlists_url(&self, options: &ListPlaylistsOptions) -> ClientResult<Url> {
        let part = if options.part.is_empty() {
            DEFAULT_PLAYLIST_PARTS
        } else {
            options.part.as_str()
        };
        let max_results = match options.max_results {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        }
        .to_string();
        let channel_id = options.channel_id.as_deref().filter(|id| !id.is_empty());

        let mut params = vec![("part", part)];
        if options.mine || channel_id.is_none() {
            params.push(("mine", "true"));
        }
        if let Some(channel_id) = channel_id {
            params.push(("channelId", channel_id));
        }
        params.push(("maxResults", max_results.as_str()));
        if let Some(token) = options.page_token.as_deref().filter(|t| !t.is_empty()) {
            params.push(("pageToken", token));
        }

        self.endpoint("playlists", &params)
    }

    fn playlist_items_url(&self, playlist_id: &str, max_results: u32) -> ClientResult<Url> {
        let max_results = match max_results {
            0 => DEFAULT_ITEMS_PAGE_SIZE,
            n => n,
        }
        .to_string();

        self.endpoint(
            "playlistItems",
            &[
                ("part", "snippet"),
                ("playlistId", playlist_id),
                ("maxResults", max_results.as_str()),
            ],
        )
    }

    fn endpoint(&self, resource: &str, params: &[(&str, &str)]) -> ClientResult<Url> {
        let raw = format!("{}/{}", self.base_url, resource);
        Url::parse_with_params(&raw, params).map_err(|_| ClientError::BaseUrl(raw))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ClientResult<T> {
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if status != StatusCode::OK {
            let body = String::from_utf8_lossy(&body).into_owned();
            error!("YouTube API returned {}: {}", status, body);
            return Err(ClientError::Status { status, body });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
