use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthUrlResponse {
    pub auth_url: String,
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthCallbackRequest {
    #[serde(default)]
    pub auth_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_token: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub video_count: u32,
    pub privacy_status: String,
    pub created_at: DateTime<Utc>,
    pub channel_title: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistsResponse {
    pub playlists: Vec<PlaylistResponse>,
    pub total_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistDetailResponse {
    #[serde(flatten)]
    pub playlist: PlaylistResponse,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<VideoResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub position: u32,
    pub added_at: DateTime<Utc>,
    pub thumbnail_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaylistVideosResponse {
    pub playlist_id: String,
    pub videos: Vec<VideoResponse>,
    pub count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistsQuery {
    pub max_results: Option<String>,
    pub page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideosQuery {
    pub max_results: Option<String>,
}

/// Export parameters. Absent and `null` fields both take their defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub format: String,
    /// Accepted for forward compatibility; no format reads it yet.
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub include_info: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub format: String,
    pub data: String,
    pub message: String,
}
