use crate::{
    auth::BearerToken,
    error::{AppError, Result},
    models::{
        PlaylistDetailResponse, PlaylistResponse, PlaylistVideosResponse, PlaylistsQuery,
        PlaylistsResponse, VideoResponse, VideosQuery,
    },
    youtube::{self, ClientError, ListPlaylistsOptions, Thumbnail, YouTubeClient},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Stand-in for upstream timestamps that fail to parse.
pub const UNPARSED_TIMESTAMP: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

static UNPARSED_TIMESTAMPS: AtomicU64 = AtomicU64::new(0);

/// Page size used when fetching the videos of a single playlist.
pub const PLAYLIST_VIDEOS_PAGE: u32 = 50;

pub fn parse_timestamp(raw: &str, field: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(e) => {
            let seen = UNPARSED_TIMESTAMPS.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                "Unparseable {} {:?} ({}), using epoch; {} so far",
                field, raw, e, seen
            );
            UNPARSED_TIMESTAMP
        }
    }
}

/// Prefers the medium thumbnail, then the default one.
pub fn pick_thumbnail(thumbnails: &HashMap<String, Thumbnail>) -> String {
    thumbnails
        .get("medium")
        .or_else(|| thumbnails.get("default"))
        .map(|t| t.url.clone())
        .unwrap_or_default()
}

pub fn to_playlist_response(playlist: &youtube::Playlist) -> PlaylistResponse {
    let snippet = &playlist.snippet;
    PlaylistResponse {
        id: playlist.id.clone(),
        title: snippet.title.clone(),
        description: snippet.description.clone(),
        video_count: playlist.content_details.item_count,
        privacy_status: playlist.status.privacy_status.clone(),
        created_at: parse_timestamp(&snippet.published_at, "playlist publishedAt"),
        channel_title: snippet.channel_title.clone(),
        thumbnail_url: pick_thumbnail(&snippet.thumbnails),
    }
}

pub fn to_video_response(item: &youtube::PlaylistItem) -> VideoResponse {
    let snippet = &item.snippet;
    VideoResponse {
        id: snippet.resource_id.video_id.clone(),
        title: snippet.title.clone(),
        description: snippet.description.clone(),
        channel_title: snippet.channel_title.clone(),
        duration: None,
        position: snippet.position,
        added_at: parse_timestamp(&snippet.published_at, "item publishedAt"),
        thumbnail_url: pick_thumbnail(&snippet.thumbnails),
    }
}

pub async fn fetch_playlists(
    client: &YouTubeClient,
    max_results: u32,
    page_token: Option<String>,
) -> Result<PlaylistsResponse> {
    let response = client
        .list_playlists(&ListPlaylistsOptions::mine(max_results, page_token))
        .await
        .map_err(|e| AppError::internal("Failed to fetch playlists", e))?;

    Ok(PlaylistsResponse {
        playlists: response.items.iter().map(to_playlist_response).collect(),
        total_count: response.page_info.total_results,
        next_page_token: response.next_page_token,
        prev_page_token: response.prev_page_token,
    })
}

/// Playlist metadata plus the first page of its videos.
pub async fn fetch_playlist_detail(
    client: &YouTubeClient,
    playlist_id: &str,
) -> Result<PlaylistDetailResponse> {
    let playlist = client
        .get_playlist_by_id(playlist_id)
        .await
        .map_err(|e| lookup_error(e, "Failed to fetch playlist"))?;

    let videos = fetch_playlist_videos(client, playlist_id, PLAYLIST_VIDEOS_PAGE).await?;

    Ok(PlaylistDetailResponse {
        playlist: to_playlist_response(&playlist),
        videos,
    })
}

pub async fn fetch_playlist_videos(
    client: &YouTubeClient,
    playlist_id: &str,
    max_results: u32,
) -> Result<Vec<VideoResponse>> {
    let items = client
        .list_playlist_items(playlist_id, max_results)
        .await
        .map_err(|e| lookup_error(e, "Failed to fetch playlist items"))?;

    Ok(items.items.iter().map(to_video_response).collect())
}

fn lookup_error(e: ClientError, message: &str) -> AppError {
    if e.is_not_found() {
        AppError::not_found("Playlist not found", e)
    } else {
        AppError::internal(message, e)
    }
}

/// Lenient page-size parsing: anything outside 1..=max falls back to `default`.
pub fn page_size(raw: Option<&str>, default: u32, max: u32) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|n| (1..=max).contains(n))
        .unwrap_or(default)
}

// GET /api/playlists
pub async fn list_playlists(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Query(query): Query<PlaylistsQuery>,
) -> Result<Json<PlaylistsResponse>> {
    let max_results = page_size(
        query.max_results.as_deref(),
        youtube::DEFAULT_PAGE_SIZE,
        youtube::MAX_PAGE_SIZE,
    );
    let page_token = query.page_token.filter(|t| !t.is_empty());
    debug!("Listing playlists (max_results={})", max_results);

    let client = state.youtube(&token);
    Ok(Json(fetch_playlists(&client, max_results, page_token).await?))
}

// GET /api/playlists/:id
pub async fn get_playlist(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Path(playlist_id): Path<String>,
) -> Result<Json<PlaylistDetailResponse>> {
    let playlist_id = require_id(playlist_id)?;
    let client = state.youtube(&token);
    Ok(Json(fetch_playlist_detail(&client, &playlist_id).await?))
}

// GET /api/playlists/:id/songs
pub async fn get_playlist_videos(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Path(playlist_id): Path<String>,
    Query(query): Query<VideosQuery>,
) -> Result<Json<PlaylistVideosResponse>> {
    let playlist_id = require_id(playlist_id)?;
    let max_results = page_size(
        query.max_results.as_deref(),
        PLAYLIST_VIDEOS_PAGE,
        youtube::MAX_PAGE_SIZE,
    );

    let client = state.youtube(&token);
    let videos = fetch_playlist_videos(&client, &playlist_id, max_results).await?;

    Ok(Json(PlaylistVideosResponse {
        count: videos.len(),
        playlist_id,
        videos,
    }))
}

pub fn require_id(playlist_id: String) -> Result<String> {
    let trimmed = playlist_id.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("Playlist ID is required".into()));
    }
    Ok(trimmed.to_string())
}
