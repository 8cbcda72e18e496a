//! Session holder: the shared identity every provider reads from.
//!
//! The current session lives behind a lock, auth-state changes are broadcast
//! to any number of listeners, and the session is persisted as JSON so that a
//! restart picks it up again.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;

const EVENT_CAPACITY: usize = 16;

/// Authenticated user as returned by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Absolute expiry, unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthUser,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// Fills `expires_at` from `expires_in` when the server only sent the latter.
    pub fn normalize(mut self, received_at: DateTime<Utc>) -> Self {
        if self.expires_at.is_none() {
            if let Some(secs) = self.expires_in {
                self.expires_at = Some(received_at.timestamp() + secs);
            }
        }
        self
    }

    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// True when the access token is expired or will be within `margin`.
    /// A session without expiry information never counts as expiring.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(at) => at <= (now + margin).timestamp(),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Uuid),
    SignedOut,
    TokenRefreshed(Uuid),
    UserUpdated(Uuid),
    PasswordRecovery,
}

pub struct SessionStore {
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            current: RwLock::new(None),
            events,
            path,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    /// Loads a persisted session, if any. A corrupt file is discarded.
    pub async fn restore(&self) -> Result<Option<Session>, AppError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<Session>(&raw) {
            Ok(session) => {
                info!("Restored session for user {}", session.user_id());
                *self.current.write().await = Some(session.clone());
                self.notify(AuthEvent::SignedIn(session.user_id()));
                Ok(Some(session))
            }
            Err(e) => {
                warn!("Discarding unreadable session file {}: {e}", path.display());
                let _ = tokio::fs::remove_file(path).await;
                Ok(None)
            }
        }
    }

    pub async fn get(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    pub async fn user_id(&self) -> Option<Uuid> {
        self.current.read().await.as_ref().map(Session::user_id)
    }

    /// Replaces the session, persists it and emits `event`.
    pub async fn set(&self, session: Session, event: AuthEvent) -> Result<(), AppError> {
        self.persist(&session).await?;
        *self.current.write().await = Some(session);
        self.notify(event);
        Ok(())
    }

    /// Drops the session locally and on disk, then emits `SignedOut`.
    pub async fn clear(&self) -> Result<(), AppError> {
        *self.current.write().await = None;
        if let Some(path) = &self.path {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.notify(AuthEvent::SignedOut);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn notify(&self, event: AuthEvent) {
        debug!("Auth state change: {event:?}");
        // No listeners is fine.
        let _ = self.events.send(event);
    }

    async fn persist(&self, session: &Session) -> Result<(), AppError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(session)?;

        // Holds a refresh token: owner read/write only.
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options.open(path).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // `mode` only applies on creation; tighten a file left by an older run.
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        file.write_all(&json).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_session(user_id: Uuid) -> Session {
    Session {
        access_token: format!("access-{user_id}"),
        refresh_token: "refresh".to_string(),
        token_type: "bearer".to_string(),
        expires_at: Some(Utc::now().timestamp() + 3600),
        expires_in: Some(3600),
        user: AuthUser {
            id: user_id,
            email: Some("cliente@tigo.com.bo".to_string()),
            user_metadata: serde_json::Value::Null,
        },
    }
}
