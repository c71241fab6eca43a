use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub credentials_file: PathBuf,
    pub token_file: PathBuf,
    pub environment: String,
    pub api_base_url: String,
    pub interactive_auth: bool,
    pub open_browser: bool,
    pub upstream_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid PORT")?,

            credentials_file: std::env::var("GOOGLE_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("client_secret.json")),

            token_file: std::env::var("TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| default_token_file()),

            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),

            api_base_url: std::env::var("API_BASE_URL")
                .unwrap_or_else(|_| "https://www.googleapis.com/youtube/v3".to_string()),

            interactive_auth: env_flag("INTERACTIVE_AUTH", true)?,

            open_browser: env_flag("OPEN_BROWSER", true)?,

            upstream_timeout: match std::env::var("UPSTREAM_TIMEOUT_SECS") {
                Ok(secs) => Some(Duration::from_secs(
                    secs.parse().context("Invalid UPSTREAM_TIMEOUT_SECS")?,
                )),
                Err(_) => None,
            },
        })
    }

    pub fn server_address(&self) -> SocketAddr {
        ([0, 0, 0, 0], self.port).into()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

// Token lives next to other per-user data unless TOKEN_FILE says otherwise
fn default_token_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("playlist-export").join("token.json"))
        .unwrap_or_else(|| PathBuf::from("token.json"))
}

fn env_flag(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value).with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {:?}", other),
    }
}

#[cfg(test)]
pub(crate) fn test_config(
    api_base_url: &str,
    credentials_file: PathBuf,
    token_file: PathBuf,
) -> Config {
    Config {
        port: 0,
        credentials_file,
        token_file,
        environment: "test".to_string(),
        api_base_url: api_base_url.to_string(),
        interactive_auth: false,
        open_browser: false,
        upstream_timeout: None,
    }
}
