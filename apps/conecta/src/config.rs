use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_STORAGE_BUCKET: &str = "planes-imagenes";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted backend, e.g. `https://xyz.supabase.co`.
    pub backend_url: String,
    /// Public (anon) API key. Row-level security applies on top of it.
    pub anon_key: String,
    /// Where the session is persisted between runs. `None` keeps it in memory only.
    pub session_file: Option<PathBuf>,
    pub storage_bucket: String,
    pub http_timeout_secs: u64,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let session_file = match std::env::var("CONECTA_SESSION_FILE") {
            Ok(path) if path.is_empty() => None,
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => default_session_file(),
        };

        Ok(Config {
            backend_url: require_env("CONECTA_URL")?
                .trim_end_matches('/')
                .to_string(),
            anon_key: require_env("CONECTA_ANON_KEY")?,
            session_file,
            storage_bucket: std::env::var("CONECTA_STORAGE_BUCKET")
                .unwrap_or_else(|_| DEFAULT_STORAGE_BUCKET.to_string()),
            http_timeout_secs: match std::env::var("CONECTA_HTTP_TIMEOUT_SECS") {
                Ok(v) => v
                    .parse::<u64>()
                    .context("CONECTA_HTTP_TIMEOUT_SECS must be a whole number of seconds")?,
                Err(_) => DEFAULT_HTTP_TIMEOUT_SECS,
            },
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Configuration pointing at an arbitrary backend with no session file.
    pub fn for_backend(backend_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Config {
            backend_url: backend_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            session_file: None,
            storage_bucket: DEFAULT_STORAGE_BUCKET.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            rust_log: "info".to_string(),
        }
    }

    /// WebSocket endpoint of the realtime service.
    pub fn realtime_url(&self) -> String {
        let ws_base = if let Some(rest) = self.backend_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.backend_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.backend_url.clone()
        };
        format!(
            "{ws_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            self.anon_key
        )
    }
}

fn default_session_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".conecta").join("session.json"))
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
