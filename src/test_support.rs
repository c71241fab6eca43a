//! In-process stand-in for the Google token endpoint and the YouTube Data
//! API, served on an ephemeral localhost port.

use axum::{
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;

pub struct FakeGoogle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FakeGoogle {
    pub const ACCESS_TOKEN: &'static str = "test-access-token";

    pub async fn start() -> Self {
        let app = Router::new()
            .route("/token", post(token))
            .route("/youtube/v3/playlists", get(playlists))
            .route("/youtube/v3/playlistItems", get(playlist_items));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, handle }
    }

    pub fn api_base_url(&self) -> String {
        format!("http://{}/youtube/v3", self.addr)
    }

    pub fn token_uri(&self) -> String {
        format!("http://{}/token", self.addr)
    }
}

impl Drop for FakeGoogle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Writes an "installed app" credentials file pointing at `token_uri`.
pub fn write_credentials(dir: &Path, token_uri: &str) -> PathBuf {
    let path = dir.join("client_secret.json");
    let credentials = json!({
        "installed": {
            "client_id": "test-client.apps.googleusercontent.com",
            "project_id": "playlist-export-test",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": token_uri,
            "auth_provider_x509_cert_url": "https://www.googleapis.com/oauth2/v1/certs",
            "client_secret": "test-secret",
            "redirect_uris": ["http://localhost"]
        }
    });
    std::fs::write(&path, credentials.to_string()).unwrap();
    path
}

async fn token(Form(form): Form<HashMap<String, String>>) -> Response {
    let field = |name: &str| form.get(name).map(String::as_str);

    if field("client_id") != Some("test-client.apps.googleusercontent.com")
        || field("client_secret") != Some("test-secret")
    {
        return invalid_grant("invalid_client");
    }

    match (field("grant_type"), field("code"), field("refresh_token")) {
        (Some("authorization_code"), Some("good-code"), _) => Json(json!({
            "access_token": "ya29.exchanged",
            "expires_in": 3599,
            "refresh_token": "1//issued",
            "scope": "https://www.googleapis.com/auth/youtube.readonly",
            "token_type": "Bearer"
        }))
        .into_response(),
        (Some("refresh_token"), _, Some("1//refresh")) => Json(json!({
            "access_token": "ya29.refreshed",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/youtube.readonly",
            "token_type": "Bearer"
        }))
        .into_response(),
        _ => invalid_grant("invalid_grant"),
    }
}

fn invalid_grant(error: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": error, "error_description": "Bad Request" })),
    )
        .into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {}", FakeGoogle::ACCESS_TOKEN).as_str())
}

fn auth_error() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "error": {
                "code": 401,
                "message": "Request had invalid authentication credentials.",
                "errors": [{ "reason": "authError" }]
            }
        })),
    )
        .into_response()
}

fn all_playlists() -> Vec<Value> {
    vec![
        json!({
            "kind": "youtube#playlist",
            "id": "PL123",
            "snippet": {
                "publishedAt": "2022-03-04T05:06:07Z",
                "channelId": "UCme",
                "title": "My Mix",
                "description": "things I like",
                "channelTitle": "Me",
                "thumbnails": {
                    "default": { "url": "https://i.ytimg.com/mix-default.jpg", "width": 120, "height": 90 },
                    "medium": { "url": "https://i.ytimg.com/mix-medium.jpg", "width": 320, "height": 180 }
                }
            },
            "status": { "privacyStatus": "private" },
            "contentDetails": { "itemCount": 1 }
        }),
        json!({
            "id": "PL456",
            "snippet": {
                "publishedAt": "not-a-date",
                "title": "Broken Dates",
                "channelTitle": "Me"
            },
            "status": { "privacyStatus": "public" },
            "contentDetails": { "itemCount": 0 }
        }),
        json!({
            "id": "PL789",
            "snippet": { "publishedAt": "2021-01-01T00:00:00Z", "title": "Old" },
            "status": { "privacyStatus": "unlisted" },
            "contentDetails": { "itemCount": 12 }
        }),
    ]
}

async fn playlists(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return auth_error();
    }

    let all = all_playlists();

    if let Some(id) = query.get("id") {
        if id == "PLgarbage" {
            return (StatusCode::OK, "{\"items\": [").into_response();
        }
        let items: Vec<Value> = all.into_iter().filter(|p| p["id"] == *id).collect();
        return Json(json!({
            "kind": "youtube#playlistListResponse",
            "pageInfo": { "totalResults": items.len(), "resultsPerPage": 5 },
            "items": items
        }))
        .into_response();
    }

    let max_results: usize = query
        .get("maxResults")
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);
    let total = all.len();
    let items: Vec<Value> = all.into_iter().take(max_results).collect();

    let mut body = json!({
        "kind": "youtube#playlistListResponse",
        "pageInfo": { "totalResults": total, "resultsPerPage": max_results },
        "items": items
    });
    if max_results < total {
        body["nextPageToken"] = json!("CAIQAA");
    }
    Json(body).into_response()
}

async fn playlist_items(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return auth_error();
    }

    match query.get("playlistId").map(String::as_str) {
        Some("PL123") => Json(json!({
            "kind": "youtube#playlistItemListResponse",
            "pageInfo": { "totalResults": 1, "resultsPerPage": 50 },
            "items": [{
                "kind": "youtube#playlistItem",
                "id": "UEwxMjMuYWJjMTIz",
                "snippet": {
                    "publishedAt": "2024-01-02T03:04:05Z",
                    "channelId": "UCx",
                    "title": "SongY",
                    "description": "official audio",
                    "channelTitle": "ChanX",
                    "playlistId": "PL123",
                    "position": 0,
                    "thumbnails": {
                        "default": { "url": "https://i.ytimg.com/vi/abc123/default.jpg" }
                    },
                    "resourceId": { "kind": "youtube#video", "videoId": "abc123" }
                }
            }]
        }))
        .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": {
                    "code": 404,
                    "message": "The playlist identified with the request's playlistId parameter cannot be found.",
                    "errors": [{ "reason": "playlistNotFound" }]
                }
            })),
        )
            .into_response(),
    }
}
