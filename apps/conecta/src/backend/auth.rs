//! Auth endpoints (`/auth/v1/*`).

use chrono::Utc;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::BackendClient;
use crate::errors::AppError;
use crate::session::{AuthEvent, AuthUser, Session};

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a Value,
}

#[derive(Debug, Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
struct RecoverBody<'a> {
    email: &'a str,
}

/// What sign-up produced. With email confirmation enabled the backend
/// creates the user but does not open a session.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpResult {
    SignedIn(Session),
    ConfirmationPending(AuthUser),
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    user: AuthUser,
}

impl BackendClient {
    /// `POST /auth/v1/signup` with `metadata` stored as user metadata.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &Value,
    ) -> Result<SignUpResult, AppError> {
        let request = self
            .anon_request(Method::POST, "/auth/v1/signup")
            .json(&SignUpBody {
                email,
                password,
                data: metadata,
            });
        let body: Value = self.send_json(request).await?;
        let result = parse_sign_up(body)?;
        if let SignUpResult::SignedIn(session) = &result {
            info!("Signed up and signed in user {}", session.user_id());
            self.session
                .set(session.clone(), AuthEvent::SignedIn(session.user_id()))
                .await?;
        }
        Ok(result)
    }

    /// `POST /auth/v1/token?grant_type=password`.
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let request = self
            .anon_request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&Credentials { email, password });
        let session: Session = self.send_json(request).await?;
        let session = session.normalize(Utc::now());
        info!("Signed in user {}", session.user_id());
        self.session
            .set(session.clone(), AuthEvent::SignedIn(session.user_id()))
            .await?;
        Ok(session)
    }

    /// `POST /auth/v1/token?grant_type=refresh_token`. A rejected refresh
    /// token ends the session.
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError> {
        let request = self
            .anon_request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshBody { refresh_token });
        match self.send_json::<Session>(request).await {
            Ok(session) => {
                let session = session.normalize(Utc::now());
                self.session
                    .set(session.clone(), AuthEvent::TokenRefreshed(session.user_id()))
                    .await?;
                Ok(session)
            }
            Err(e @ (AppError::Http(_) | AppError::Io(_))) => Err(e),
            Err(e) => {
                warn!("Session refresh rejected, signing out: {e}");
                self.session.clear().await?;
                Err(AppError::Unauthorized)
            }
        }
    }

    /// `POST /auth/v1/logout`. The local session is dropped even when the
    /// remote call fails.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        let Some(session) = self.session.get().await else {
            return Ok(());
        };
        let request = self.request_with_token(Method::POST, "/auth/v1/logout", &session.access_token);
        let remote = self.send(request).await.map(|_| ());
        self.session.clear().await?;
        info!("Signed out user {}", session.user_id());
        match remote {
            Ok(()) | Err(AppError::Unauthorized) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// `POST /auth/v1/recover`: asks the backend to email a reset link.
    pub async fn send_password_reset(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AppError> {
        let mut request = self
            .anon_request(Method::POST, "/auth/v1/recover")
            .json(&RecoverBody { email });
        if let Some(redirect) = redirect_to {
            request = request.query(&[("redirect_to", redirect)]);
        }
        self.send(request).await?;
        self.session.notify(AuthEvent::PasswordRecovery);
        Ok(())
    }

    /// `PUT /auth/v1/user` with arbitrary attributes (`password`, `data`, ...).
    pub async fn update_user(&self, attributes: &Value) -> Result<AuthUser, AppError> {
        let request = self
            .request(Method::PUT, "/auth/v1/user")
            .await?
            .json(attributes);
        let user: AuthUser = self.send_json(request).await?;
        if let Some(mut session) = self.session.get().await {
            session.user = user.clone();
            self.session
                .set(session, AuthEvent::UserUpdated(user.id))
                .await?;
        }
        Ok(user)
    }

    /// `GET /auth/v1/user`: validates the current token against the backend.
    pub async fn get_user(&self) -> Result<AuthUser, AppError> {
        let request = self.request(Method::GET, "/auth/v1/user").await?;
        self.send_json(request).await
    }
}

fn parse_sign_up(body: Value) -> Result<SignUpResult, AppError> {
    if body.get("access_token").is_some() {
        let session: Session = serde_json::from_value(body)?;
        return Ok(SignUpResult::SignedIn(session.normalize(Utc::now())));
    }
    if body.get("user").is_some_and(|u| u.is_object()) {
        let envelope: UserEnvelope = serde_json::from_value(body)?;
        return Ok(SignUpResult::ConfirmationPending(envelope.user));
    }
    let user: AuthUser = serde_json::from_value(body)?;
    Ok(SignUpResult::ConfirmationPending(user))
}
