use crate::{
    error::{AppError, Result},
    models::{AuthCallbackRequest, AuthResponse, AuthUrlResponse},
    oauth::{AuthError, TokenProvider},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::header,
    middleware::Next,
    response::Response,
    Json,
};
use tracing::{debug, info};

/// Access token presented by an API caller, placed in request extensions
/// by [`require_bearer`].
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

impl BearerToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

const AUTH_SUCCESS: &str = "Successfully authenticated with YouTube";

// GET /auth/youtube/url
pub async fn auth_url(State(state): State<AppState>) -> Result<Json<AuthUrlResponse>> {
    let auth_url = state
        .tokens
        .authorize_url()
        .map_err(|e| AppError::internal("Failed to generate auth URL", e))?;

    info!("Generated YouTube authorization URL");
    Ok(Json(AuthUrlResponse {
        auth_url,
        message: "Visit this URL to authorize the application, then POST the code to /auth/youtube/callback".to_string(),
    }))
}

// POST /auth/youtube/callback
pub async fn auth_callback(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AuthCallbackRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let Json(request) = payload.map_err(|e| AppError::bad_request("Invalid request body", e))?;

    let code = request.auth_code.trim().to_string();
    if code.is_empty() {
        return Err(AppError::BadRequest("Authorization code is required".into()));
    }

    let access_token = state
        .tokens
        .access_token(TokenProvider::CallbackCode(code))
        .await
        .map_err(|e| match e {
            AuthError::Exchange(_) | AuthError::MissingCode => {
                AppError::bad_request("Invalid authorization code", e)
            }
            other => AppError::internal("Failed to complete YouTube authentication", other),
        })?;

    Ok(Json(AuthResponse {
        success: true,
        access_token,
        message: AUTH_SUCCESS.to_string(),
    }))
}

// POST /auth/youtube
pub async fn authenticate(State(state): State<AppState>) -> Result<Json<AuthResponse>> {
    let provider = if state.config.interactive_auth {
        TokenProvider::InteractiveCode
    } else {
        TokenProvider::FileCached
    };
    debug!("Authenticating with {:?}", provider);

    let access_token = state
        .tokens
        .access_token(provider)
        .await
        .map_err(|e| AppError::internal("Failed to authenticate with YouTube", e))?;

    Ok(Json(AuthResponse {
        success: true,
        access_token,
        message: AUTH_SUCCESS.to_string(),
    }))
}

/// Rejects `/api` requests without a well-formed `Authorization: Bearer`
/// header.
pub async fn require_bearer(mut request: Request, next: Next) -> Result<Response> {
    let token = bearer_token(
        request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok()),
    )?;

    request.extensions_mut().insert(token);
    Ok(next.run(request).await)
}

fn bearer_token(header_value: Option<&str>) -> Result<BearerToken> {
    let value = header_value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Authorization header required".into()))?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(BearerToken(token.to_string())),
        ["Bearer", _] => Err(AppError::Unauthorized("Access token required".into())),
        _ => Err(AppError::Unauthorized(
            "Invalid authorization header format".into(),
        )),
    }
}
