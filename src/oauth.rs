use crate::{
    token_store::TokenStore,
    types::{Credentials, StoredToken, TokenRequest, TokenResponse},
};
use axum::http::header;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub const YOUTUBE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

const AUTH_STATE: &str = "state-token";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("unable to read credentials file {path}: {source}")]
    CredentialsRead { path: PathBuf, source: io::Error },

    #[error("unable to parse credentials file {path}: {source}")]
    CredentialsParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("credentials file has no redirect URIs")]
    IncompleteCredentials,

    #[error("no saved token")]
    NoToken,

    #[error("saved token expired and has no refresh token")]
    MissingRefreshToken,

    #[error("authorization code is empty")]
    MissingCode,

    #[error("authorization code exchange rejected: {0}")]
    Exchange(String),

    #[error("token refresh rejected: {0}")]
    Refresh(String),

    #[error("token endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unable to access token file: {0}")]
    Persist(#[source] io::Error),

    #[error("unable to read authorization code: {0}")]
    Prompt(#[source] io::Error),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// How a caller wants a token obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenProvider {
    /// Saved token, refreshed if expired. Never prompts.
    FileCached,
    /// Like `FileCached`, but falls back to the console code flow when no
    /// usable token is on disk.
    InteractiveCode,
    /// Exchange a code delivered by the web callback.
    CallbackCode(String),
}

/// OAuth endpoints and client registration read from the credentials file.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
    redirect_uri: String,
}

impl OAuthClient {
    pub fn load(path: &Path) -> AuthResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|source| AuthError::CredentialsRead {
            path: path.to_path_buf(),
            source,
        })?;
        let credentials: Credentials =
            serde_json::from_str(&data).map_err(|source| AuthError::CredentialsParse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_credentials(credentials)
    }

    pub fn from_credentials(credentials: Credentials) -> AuthResult<Self> {
        let app = credentials.installed;
        let redirect_uri = app
            .redirect_uris
            .into_iter()
            .next()
            .ok_or(AuthError::IncompleteCredentials)?;

        Ok(Self {
            client_id: app.client_id,
            client_secret: app.client_secret,
            auth_uri: app.auth_uri,
            token_uri: app.token_uri,
            redirect_uri,
        })
    }

    pub fn authorize_url(&self) -> String {
        let params = [
            ("access_type", "offline"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", YOUTUBE_READONLY_SCOPE),
            ("state", AUTH_STATE),
        ];
        // Encoding a slice of string pairs cannot fail
        let query = serde_urlencoded::to_string(&params[..]).unwrap_or_default();
        let separator = if self.auth_uri.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.auth_uri, separator, query)
    }

    pub async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
    ) -> AuthResult<StoredToken> {
        let request = TokenRequest {
            grant_type: "authorization_code".to_string(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            code: Some(code.to_string()),
            redirect_uri: Some(self.redirect_uri.clone()),
            refresh_token: None,
        };

        let response = self
            .post_token(http, &request)
            .await?
            .map_err(AuthError::Exchange)?;
        Ok(StoredToken::from_response(response, None))
    }

    pub async fn refresh(
        &self,
        http: &reqwest::Client,
        refresh_token: &str,
    ) -> AuthResult<StoredToken> {
        let request = TokenRequest {
            grant_type: "refresh_token".to_string(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            code: None,
            redirect_uri: None,
            refresh_token: Some(refresh_token.to_string()),
        };

        let response = self
            .post_token(http, &request)
            .await?
            .map_err(AuthError::Refresh)?;
        Ok(StoredToken::from_response(
            response,
            Some(refresh_token.to_string()),
        ))
    }

    /// Outer error is transport, inner is a rejection carrying the body.
    async fn post_token(
        &self,
        http: &reqwest::Client,
        request: &TokenRequest,
    ) -> AuthResult<std::result::Result<TokenResponse, String>> {
        debug!(
            "Requesting {} token at: {}",
            request.grant_type, self.token_uri
        );

        let response = http
            .post(&self.token_uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Token endpoint returned {}: {}", status, body);
            return Ok(Err(format!("{}: {}", status, body)));
        }

        let parsed: std::result::Result<TokenResponse, String> = serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse token response: {}", e));
        if let Ok(token) = &parsed {
            debug!("Token granted for scope {:?}", token.scope);
        }
        Ok(parsed)
    }
}

/// Obtains access tokens and keeps the token file current.
#[derive(Debug)]
pub struct TokenManager {
    credentials_file: PathBuf,
    store: TokenStore,
    http: reqwest::Client,
    open_browser: bool,
    // Held across load-refresh-persist and exchange-persist, never across
    // the console prompt.
    lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        credentials_file: impl Into<PathBuf>,
        store: TokenStore,
        http: reqwest::Client,
        open_browser: bool,
    ) -> Self {
        Self {
            credentials_file: credentials_file.into(),
            store,
            http,
            open_browser,
            lock: Mutex::new(()),
        }
    }

    pub fn authorize_url(&self) -> AuthResult<String> {
        Ok(OAuthClient::load(&self.credentials_file)?.authorize_url())
    }

    pub async fn access_token(&self, provider: TokenProvider) -> AuthResult<String> {
        let mut stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.access_token_with_input(provider, &mut stdin).await
    }

    /// Like [`access_token`](Self::access_token), reading a console code
    /// from `input` instead of stdin.
    pub async fn access_token_with_input<R>(
        &self,
        provider: TokenProvider,
        input: &mut R,
    ) -> AuthResult<String>
    where
        R: AsyncBufRead + Unpin,
    {
        let client = OAuthClient::load(&self.credentials_file)?;

        let token = match provider {
            TokenProvider::FileCached => {
                let _guard = self.lock.lock().await;
                self.cached(&client).await?
            }
            TokenProvider::InteractiveCode => {
                let cached = {
                    let _guard = self.lock.lock().await;
                    self.cached(&client).await
                };
                match cached {
                    Err(AuthError::NoToken | AuthError::MissingRefreshToken) => {
                        // The prompt can wait indefinitely; only the exchange holds the lock
                        let code = self.prompt_for_code(&client, input).await?;
                        let _guard = self.lock.lock().await;
                        self.exchange(&client, &code).await?
                    }
                    other => other?,
                }
            }
            TokenProvider::CallbackCode(code) => {
                let _guard = self.lock.lock().await;
                self.exchange(&client, &code).await?
            }
        };

        Ok(token.access_token)
    }

    async fn cached(&self, client: &OAuthClient) -> AuthResult<StoredToken> {
        let token = self
            .store
            .load()
            .map_err(AuthError::Persist)?
            .ok_or(AuthError::NoToken)?;

        if token.is_valid() {
            debug!("Using saved token");
            return Ok(token);
        }

        let refresh_token = token
            .refresh_token
            .as_deref()
            .ok_or(AuthError::MissingRefreshToken)?;

        info!("Saved token expired, refreshing");
        let refreshed = client.refresh(&self.http, refresh_token).await?;
        self.store.save(&refreshed).map_err(AuthError::Persist)?;
        Ok(refreshed)
    }

    async fn exchange(&self, client: &OAuthClient, code: &str) -> AuthResult<StoredToken> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }

        let token = client.exchange_code(&self.http, code).await?;
        self.store.save(&token).map_err(AuthError::Persist)?;
        info!(
            "Authorization code exchanged, token saved to {}",
            self.store.path().display()
        );
        Ok(token)
    }

    async fn prompt_for_code<R>(&self, client: &OAuthClient, input: &mut R) -> AuthResult<String>
    where
        R: AsyncBufRead + Unpin,
    {
        let auth_url = client.authorize_url();
        println!(
            "Go to the following link in your browser:\n{}\n",
            auth_url
        );

        if self.open_browser {
            if let Err(e) = webbrowser::open(&auth_url) {
                warn!("Could not open browser automatically: {}", e);
            }
        }

        println!("Enter the authorization code: ");
        read_authorization_code(input).await
    }
}

/// Reads the first non-blank line from `input`.
pub async fn read_authorization_code<R>(input: &mut R) -> AuthResult<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let read = input.read_line(&mut line).await.map_err(AuthError::Prompt)?;
        if read == 0 {
            return Err(AuthError::MissingCode);
        }
        let code = line.trim();
        if !code.is_empty() {
            return Ok(code.to_string());
        }
    }
}
