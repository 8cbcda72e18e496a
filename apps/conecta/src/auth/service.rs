use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::auth::repository::{AuthRepository, ProfileRepository};
use crate::backend::auth::SignUpResult;
use crate::errors::AppError;
use crate::models::{Profile, ProfileChanges, Role};
use crate::session::AuthUser;
use crate::validation::{
    validate_email, validate_login, validate_password, validate_profile, validate_registration,
    Registration,
};

const UNKNOWN_NAME: &str = "Nombre Desconocido";

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegisterOutcome {
    SignedIn(Profile),
    /// The account exists but the email must be confirmed before signing in.
    ConfirmationPending { email: String },
}

/// Fails with `Forbidden` unless `actor` has `role`.
pub fn ensure_role(actor: &Profile, role: Role, message: &str) -> Result<(), AppError> {
    if actor.role != role {
        return Err(AppError::Forbidden(message.to_string()));
    }
    Ok(())
}

pub struct AuthService {
    auth: Arc<dyn AuthRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl AuthService {
    pub fn new(auth: Arc<dyn AuthRepository>, profiles: Arc<dyn ProfileRepository>) -> Self {
        Self { auth, profiles }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<RegisterOutcome, AppError> {
        validate_registration(&Registration {
            email: &request.email,
            password: &request.password,
            full_name: &request.full_name,
            phone: &request.phone,
        })?;

        let email = request.email.trim();
        let full_name = request.full_name.trim();
        let phone = request.phone.trim();
        // The profile row, role included, is created by a backend trigger
        // from this metadata. The client never chooses a role.
        let metadata = json!({
            "name": full_name,
            "telefono": phone,
        });

        match self.auth.sign_up(email, &request.password, &metadata).await? {
            SignUpResult::SignedIn(session) => {
                let profile = Profile {
                    id: session.user_id(),
                    email: Some(email.to_string()),
                    full_name: full_name.to_string(),
                    phone: Some(phone.to_string()),
                    role: Role::Customer,
                };
                info!("Registered {}", profile.id);
                Ok(RegisterOutcome::SignedIn(profile))
            }
            SignUpResult::ConfirmationPending(user) => {
                info!("Registered {}, awaiting email confirmation", user.id);
                Ok(RegisterOutcome::ConfirmationPending {
                    email: email.to_string(),
                })
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Profile, AppError> {
        validate_login(email, password)?;
        let session = self.auth.sign_in(email.trim(), password).await?;
        self.profile_for(&session.user).await
    }

    pub async fn logout(&self) -> Result<(), AppError> {
        self.auth.sign_out().await
    }

    pub async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<(), AppError> {
        validate_email(email)?;
        self.auth
            .send_password_reset(email.trim(), redirect_to)
            .await
    }

    pub async fn update_password(&self, new_password: &str) -> Result<(), AppError> {
        validate_password(new_password)?;
        self.auth.update_password(new_password).await
    }

    pub async fn update_profile(
        &self,
        actor: &Profile,
        full_name: &str,
        phone: &str,
    ) -> Result<Profile, AppError> {
        validate_profile(full_name, phone)?;
        let changes = ProfileChanges {
            full_name: full_name.trim().to_string(),
            phone: phone.trim().to_string(),
        };
        self.profiles.update(actor.id, &changes).await
    }

    /// Profile of the signed-in user, or `None` when nobody is signed in.
    pub async fn current_user(&self) -> Result<Option<Profile>, AppError> {
        match self.auth.current_session().await? {
            Some(session) => self.profile_for(&session.user).await.map(Some),
            None => Ok(None),
        }
    }

    /// Like [`current_user`](Self::current_user) but signed-out is an error.
    pub async fn require_user(&self) -> Result<Profile, AppError> {
        self.current_user().await?.ok_or(AppError::Unauthorized)
    }

    /// Loads the profile row. The role is only ever read from that row;
    /// without one the user is treated as a customer and nothing is written.
    async fn profile_for(&self, user: &AuthUser) -> Result<Profile, AppError> {
        if let Some(mut profile) = self.profiles.get(user.id).await? {
            profile.email = user.email.clone();
            return Ok(profile);
        }
        warn!("No profile row for user {}, using customer defaults", user.id);
        let metadata = &user.user_metadata;
        Ok(Profile {
            id: user.id,
            email: user.email.clone(),
            full_name: metadata
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(UNKNOWN_NAME)
                .to_string(),
            phone: metadata
                .get("telefono")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            role: Role::Customer,
        })
    }
}
