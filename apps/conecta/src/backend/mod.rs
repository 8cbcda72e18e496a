//! Backend gateway: the single point of entry for all calls to the hosted backend.
//!
//! No other module builds HTTP requests or opens sockets to the backend.
//! Providers go through the repository traits, whose backend implementations
//! call into this module.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::AppError;
use crate::session::SessionStore;

pub mod auth;
pub mod realtime;
pub mod rest;
pub mod storage;

/// Refresh the access token when it expires within this window.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

/// Thin wrapper over the backend's REST, auth, storage and realtime endpoints.
/// Cloning is cheap; all clones share the HTTP pool and the session.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    anon_key: String,
    realtime_url: String,
    session: Arc<SessionStore>,
}

impl BackendClient {
    pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.backend_url.clone(),
            anon_key: config.anon_key.clone(),
            realtime_url: config.realtime_url(),
            session,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bearer token for the next request: the session's access token,
    /// refreshed first if it is about to expire, or the anon key when
    /// nobody is signed in.
    pub(crate) async fn bearer(&self) -> Result<String, AppError> {
        let Some(session) = self.session.get().await else {
            return Ok(self.anon_key.clone());
        };
        if session.expires_within(chrono::Utc::now(), chrono::Duration::seconds(REFRESH_MARGIN_SECS))
        {
            let refreshed = self.refresh_session(&session.refresh_token).await?;
            return Ok(refreshed.access_token);
        }
        Ok(session.access_token)
    }

    /// Starts a request authorized as the current user.
    pub(crate) async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, AppError> {
        let token = self.bearer().await?;
        Ok(self.request_with_token(method, path, &token))
    }

    /// Starts a request with an explicit bearer token (used by the auth
    /// endpoints, which must not trigger a refresh themselves).
    pub(crate) fn request_with_token(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        debug!("{method} {path}");
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    pub(crate) fn anon_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_with_token(method, path, &self.anon_key)
    }

    /// Sends the request and maps any non-2xx status to an `AppError`
    /// carrying the backend's own message.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, AppError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!("Backend returned {}: {}", status, body);
        Err(error_from_response(status.as_u16(), &body))
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, AppError> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Builds an error from a failed response. Each backend service uses a
/// different error shape, so the first known message field wins.
pub(crate) fn error_from_response(status: u16, body: &str) -> AppError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {status}")
            } else {
                body.trim().to_string()
            }
        });

    match status {
        401 => AppError::Unauthorized,
        403 => AppError::Forbidden(message),
        404 => AppError::NotFound(message),
        _ => AppError::Backend { status, message },
    }
}
