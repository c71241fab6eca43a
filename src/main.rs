use anyhow::Result;
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod error;
mod export;
mod models;
mod oauth;
mod playlists;
mod token_store;
mod types;
mod youtube;

#[cfg(test)]
mod test_support;

use crate::{
    auth::BearerToken, config::Config, models::HealthResponse, oauth::TokenManager,
    token_store::TokenStore, youtube::YouTubeClient,
};

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: Arc<TokenManager>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build()?;

        let tokens = TokenManager::new(
            config.credentials_file.clone(),
            TokenStore::new(config.token_file.clone()),
            http_client.clone(),
            config.open_browser,
        );

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            http_client,
        })
    }

    /// Upstream client acting on behalf of the caller's token.
    pub fn youtube(&self, token: &BearerToken) -> YouTubeClient {
        YouTubeClient::new(
            self.http_client.clone(),
            self.config.api_base_url.clone(),
            token.as_str(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    let default_filter = if config.is_production() {
        "playlist_export=info,tower_http=info"
    } else {
        "playlist_export=debug,tower_http=debug"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting playlist export server ({})", config.environment);
    info!("Credentials file: {}", config.credentials_file.display());
    info!("Token file: {}", config.token_file.display());

    let app_state = AppState::new(config)?;
    let addr = app_state.config.server_address();
    let app = router(app_state);

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/playlists", get(playlists::list_playlists))
        .route("/playlists/:id", get(playlists::get_playlist))
        .route("/playlists/:id/songs", get(playlists::get_playlist_videos))
        .route("/export/:id", post(export::export_playlist))
        .route_layer(middleware::from_fn(auth::require_bearer));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/youtube/url", get(auth::auth_url))
        .route("/auth/youtube/callback", post(auth::auth_callback))
        .route("/auth/youtube", post(auth::authenticate))
        .nest("/api", api)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorResponse,
        models::{AuthResponse, AuthUrlResponse, ExportResponse, PlaylistVideosResponse},
        test_support::{write_credentials, FakeGoogle},
    };
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use serde::de::DeserializeOwned;
    use std::path::Path;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        _google: FakeGoogle,
        dir: tempfile::TempDir,
    }

    impl TestApp {
        async fn start() -> Self {
            let google = FakeGoogle::start().await;
            let dir = tempfile::tempdir().unwrap();
            let credentials = write_credentials(dir.path(), &google.token_uri());
            let config = config::test_config(
                &google.api_base_url(),
                credentials,
                dir.path().join("token.json"),
            );
            Self {
                router: router(AppState::new(config).unwrap()),
                _google: google,
                dir,
            }
        }

        fn token_path(&self) -> std::path::PathBuf {
            self.dir.path().join("token.json")
        }

        async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            (status, bytes.to_vec())
        }

        async fn json<T: DeserializeOwned>(&self, request: Request<Body>) -> (StatusCode, T) {
            let (status, bytes) = self.send(request).await;
            (status, serde_json::from_slice(&bytes).unwrap())
        }
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn token_on_disk(path: &Path) -> Option<String> {
        TokenStore::new(path)
            .load()
            .unwrap()
            .map(|t| t.access_token)
    }

    #[tokio::test]
    async fn health_reports_version() {
        let app = TestApp::start().await;
        let (status, body): (_, HealthResponse) = app.json(get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn export_m3u_end_to_end() {
        let app = TestApp::start().await;
        let (status, body): (_, ExportResponse) = app
            .json(post_json(
                "/api/export/PL123",
                Some(FakeGoogle::ACCESS_TOKEN),
                r#"{"format":"m3u"}"#,
            ))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert_eq!(body.format, "m3u");
        assert_eq!(
            body.data,
            "#EXTM3U\n#PLAYLIST:My Mix\n#EXTINF:-1,ChanX - SongY\nhttps://www.youtube.com/watch?v=abc123\n"
        );
        assert_eq!(body.message, "Successfully exported playlist 'My Mix' as m3u");
    }

    #[tokio::test]
    async fn export_defaults_to_json() {
        let app = TestApp::start().await;
        let (status, body): (_, ExportResponse) = app
            .json(post_json("/api/export/PL123", Some(FakeGoogle::ACCESS_TOKEN), "{}"))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.format, "json");
        let decoded: models::PlaylistDetailResponse = serde_json::from_str(&body.data).unwrap();
        assert_eq!(decoded.videos[0].id, "abc123");
    }

    #[tokio::test]
    async fn export_accepts_null_fields() {
        let app = TestApp::start().await;
        let (status, body): (_, ExportResponse) = app
            .json(post_json(
                "/api/export/PL123",
                Some(FakeGoogle::ACCESS_TOKEN),
                r#"{"format":null,"options":null}"#,
            ))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.format, "json");
    }

    #[tokio::test]
    async fn export_rejects_unknown_format() {
        let app = TestApp::start().await;
        let (status, body): (_, ErrorResponse) = app
            .json(post_json(
                "/api/export/PL123",
                Some(FakeGoogle::ACCESS_TOKEN),
                r#"{"format":"xml"}"#,
            ))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Bad Request");
        assert_eq!(body.code, 400);
        assert!(body.message.contains("xml"));
    }

    #[tokio::test]
    async fn export_rejects_malformed_body() {
        let app = TestApp::start().await;
        let (status, body): (_, ErrorResponse) = app
            .json(post_json(
                "/api/export/PL123",
                Some(FakeGoogle::ACCESS_TOKEN),
                "{format:",
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "Invalid request body");
    }

    #[tokio::test]
    async fn api_requires_bearer_token() {
        let app = TestApp::start().await;

        let (status, body): (_, ErrorResponse) = app.json(get("/api/playlists", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.message, "Authorization header required");
        assert_eq!(body.code, 401);

        let request = Request::builder()
            .uri("/api/playlists")
            .header(header::AUTHORIZATION, "Token abc")
            .body(Body::empty())
            .unwrap();
        let (status, body): (_, ErrorResponse) = app.json(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.message, "Invalid authorization header format");
    }

    #[tokio::test]
    async fn lists_playlists_with_clamped_page_size() {
        let app = TestApp::start().await;
        let (status, body): (_, models::PlaylistsResponse) = app
            .json(get(
                "/api/playlists?max_results=500",
                Some(FakeGoogle::ACCESS_TOKEN),
            ))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.total_count, 3);
        // 500 falls back to the default page size of 25, so all three fit
        assert_eq!(body.playlists.len(), 3);
        assert_eq!(body.next_page_token, None);
    }

    #[tokio::test]
    async fn upstream_rejection_is_internal_error() {
        let app = TestApp::start().await;
        let (status, body): (_, ErrorResponse) =
            app.json(get("/api/playlists", Some("revoked"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Failed to fetch playlists");
    }

    #[tokio::test]
    async fn unknown_playlist_is_not_found() {
        let app = TestApp::start().await;
        let (status, body): (_, ErrorResponse) = app
            .json(get("/api/playlists/PLmissing", Some(FakeGoogle::ACCESS_TOKEN)))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message, "Playlist not found");
    }

    #[tokio::test]
    async fn playlist_songs_only() {
        let app = TestApp::start().await;
        let (status, body): (_, PlaylistVideosResponse) = app
            .json(get(
                "/api/playlists/PL123/songs?max_results=5",
                Some(FakeGoogle::ACCESS_TOKEN),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.playlist_id, "PL123");
        assert_eq!(body.count, 1);
        assert_eq!(body.videos[0].channel_title, "ChanX");
    }

    #[tokio::test]
    async fn auth_url_comes_from_credentials() {
        let app = TestApp::start().await;
        let (status, body): (_, AuthUrlResponse) = app.json(get("/auth/youtube/url", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.auth_url.contains("access_type=offline"));
        assert!(body.auth_url.contains("client_id=test-client.apps.googleusercontent.com"));
    }

    #[tokio::test]
    async fn callback_exchanges_code_and_persists_token() {
        let app = TestApp::start().await;
        let (status, body): (_, AuthResponse) = app
            .json(post_json(
                "/auth/youtube/callback",
                None,
                r#"{"auth_code":"good-code"}"#,
            ))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        assert_eq!(body.access_token, "ya29.exchanged");
        assert_eq!(
            token_on_disk(&app.token_path()).as_deref(),
            Some("ya29.exchanged")
        );
    }

    #[tokio::test]
    async fn callback_errors() {
        let app = TestApp::start().await;

        let (status, body): (_, ErrorResponse) = app
            .json(post_json("/auth/youtube/callback", None, r#"{"auth_code":""}"#))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "Authorization code is required");

        let (status, body): (_, ErrorResponse) = app
            .json(post_json(
                "/auth/youtube/callback",
                None,
                r#"{"auth_code":"bad-code"}"#,
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "Invalid authorization code");
        assert_eq!(token_on_disk(&app.token_path()), None);
    }

    #[tokio::test]
    async fn authenticate_without_saved_token_fails_headless() {
        let app = TestApp::start().await;
        let (status, body): (_, ErrorResponse) = app
            .json(post_json("/auth/youtube", None, ""))
            .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Failed to authenticate with YouTube");
    }

    #[tokio::test]
    async fn authenticate_uses_saved_token() {
        let app = TestApp::start().await;
        app.send(post_json(
            "/auth/youtube/callback",
            None,
            r#"{"auth_code":"good-code"}"#,
        ))
        .await;

        let (status, body): (_, AuthResponse) = app
            .json(post_json("/auth/youtube", None, ""))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.access_token, "ya29.exchanged");
    }
}
