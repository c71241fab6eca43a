use crate::{
    auth::BearerToken,
    error::{AppError, Result},
    models::{ExportRequest, ExportResponse, PlaylistDetailResponse},
    playlists::{fetch_playlist_detail, require_id},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

const CSV_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    M3u,
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("CSV buffer error: {0}")]
    Buffer(String),
}

impl From<ExportError> for AppError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::UnsupportedFormat(_) => AppError::BadRequest(e.to_string()),
            other => AppError::internal("Failed to export playlist", other),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "" | "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "m3u" => Ok(ExportFormat::M3u),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::M3u => "m3u",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn render(
    playlist: &PlaylistDetailResponse,
    format: ExportFormat,
    include_info: bool,
) -> std::result::Result<String, ExportError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(playlist)?),
        ExportFormat::Csv => render_csv(playlist, include_info),
        ExportFormat::M3u => Ok(render_m3u(playlist)),
    }
}

fn render_csv(
    playlist: &PlaylistDetailResponse,
    include_info: bool,
) -> std::result::Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    if include_info {
        writer.write_record([
            "Position",
            "Title",
            "Channel",
            "Video ID",
            "Description",
            "Added At",
        ])?;
    } else {
        writer.write_record(["Position", "Title", "Channel", "Video ID"])?;
    }

    for video in &playlist.videos {
        let position = (u64::from(video.position) + 1).to_string();
        if include_info {
            let added_at = video.added_at.format(CSV_TIMESTAMP).to_string();
            writer.write_record([
                position.as_str(),
                video.title.as_str(),
                video.channel_title.as_str(),
                video.id.as_str(),
                video.description.as_str(),
                added_at.as_str(),
            ])?;
        } else {
            writer.write_record([
                position.as_str(),
                video.title.as_str(),
                video.channel_title.as_str(),
                video.id.as_str(),
            ])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Buffer(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

fn render_m3u(playlist: &PlaylistDetailResponse) -> String {
    let mut out = String::from("#EXTM3U\n");
    out.push_str(&format!("#PLAYLIST:{}\n", playlist.playlist.title));

    for video in &playlist.videos {
        out.push_str(&format!(
            "#EXTINF:-1,{} - {}\n",
            video.channel_title, video.title
        ));
        out.push_str(&format!("{}{}\n", WATCH_URL, video.id));
    }

    out
}

// POST /api/export/:id
pub async fn export_playlist(
    State(state): State<AppState>,
    Extension(token): Extension<BearerToken>,
    Path(playlist_id): Path<String>,
    payload: std::result::Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Json<ExportResponse>> {
    let playlist_id = require_id(playlist_id)?;
    let Json(request) = payload.map_err(|e| AppError::bad_request("Invalid request body", e))?;

    // Reject unknown formats before touching the upstream API
    let format: ExportFormat = request.format.parse()?;
    if !request.options.is_empty() {
        debug!("Ignoring export options: {:?}", request.options);
    }

    let client = state.youtube(&token);
    let playlist = fetch_playlist_detail(&client, &playlist_id).await?;
    let data = render(&playlist, format, request.include_info)?;

    info!(
        "Exported playlist {} ({} videos) as {}",
        playlist_id,
        playlist.videos.len(),
        format
    );

    Ok(Json(ExportResponse {
        success: true,
        format: format.to_string(),
        message: format!(
            "Successfully exported playlist '{}' as {}",
            playlist.playlist.title, format
        ),
        data,
    }))
}
