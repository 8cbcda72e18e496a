use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::auth::SignUpResult;
use crate::backend::BackendClient;
use crate::errors::AppError;
use crate::models::{Profile, ProfileChanges, Role};
use crate::session::Session;

const PROFILES_TABLE: &str = "profiles";
const PROFILE_COLUMNS: &str = "id,name,role,telefono";

#[async_trait]
pub trait AuthRepository: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &Value,
    ) -> Result<SignUpResult, AppError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError>;

    async fn sign_out(&self) -> Result<(), AppError>;

    async fn send_password_reset(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AppError>;

    async fn update_password(&self, new_password: &str) -> Result<(), AppError>;

    /// The live session, refreshed if it was about to expire.
    async fn current_session(&self) -> Result<Option<Session>, AppError>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Profile>, AppError>;

    async fn update(&self, id: Uuid, changes: &ProfileChanges) -> Result<Profile, AppError>;

    async fn list_by_role(&self, role: Role) -> Result<Vec<Profile>, AppError>;
}

pub struct BackendAuthRepository {
    backend: BackendClient,
}

impl BackendAuthRepository {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl AuthRepository for BackendAuthRepository {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &Value,
    ) -> Result<SignUpResult, AppError> {
        self.backend.sign_up(email, password, metadata).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        self.backend.sign_in_with_password(email, password).await
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.backend.sign_out().await
    }

    async fn send_password_reset(&self, email: &str, redirect_to: Option<&str>) -> Result<(), AppError> {
        self.backend.send_password_reset(email, redirect_to).await
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AppError> {
        self.backend
            .update_user(&json!({ "password": new_password }))
            .await
            .map(|_| ())
    }

    async fn current_session(&self) -> Result<Option<Session>, AppError> {
        if self.backend.session().get().await.is_none() {
            return Ok(None);
        }
        self.backend.bearer().await?;
        Ok(self.backend.session().get().await)
    }
}

pub struct BackendProfileRepository {
    backend: BackendClient,
}

impl BackendProfileRepository {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ProfileRepository for BackendProfileRepository {
    async fn get(&self, id: Uuid) -> Result<Option<Profile>, AppError> {
        self.backend
            .table(PROFILES_TABLE)
            .select(PROFILE_COLUMNS)
            .eq("id", id)
            .fetch_optional()
            .await
    }

    async fn update(&self, id: Uuid, changes: &ProfileChanges) -> Result<Profile, AppError> {
        let rows: Vec<Profile> = self
            .backend
            .table(PROFILES_TABLE)
            .select(PROFILE_COLUMNS)
            .eq("id", id)
            .update(changes)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Perfil {id} no encontrado")))
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<Profile>, AppError> {
        self.backend
            .table(PROFILES_TABLE)
            .select(PROFILE_COLUMNS)
            .eq("role", role.as_str())
            .order("name", true)
            .fetch()
            .await
    }
}
