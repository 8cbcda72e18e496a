use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::BackendClient;
use crate::errors::AppError;
use crate::models::{NewPlan, Plan, PlanChanges};

const PLANS_TABLE: &str = "planes_moviles";

#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// All plans in id order, or only the active ones.
    async fn list(&self, only_active: bool) -> Result<Vec<Plan>, AppError>;

    async fn get(&self, id: i64) -> Result<Option<Plan>, AppError>;

    async fn create(&self, plan: &NewPlan) -> Result<Plan, AppError>;

    async fn update(&self, id: i64, changes: &PlanChanges) -> Result<Plan, AppError>;

    async fn delete(&self, id: i64) -> Result<(), AppError>;

    /// Stores an image and returns its public URL.
    async fn upload_image(&self, path: &str, body: Bytes, content_type: &str) -> Result<String, AppError>;
}

pub struct BackendPlanRepository {
    backend: BackendClient,
    bucket: String,
}

impl BackendPlanRepository {
    pub fn new(backend: BackendClient, bucket: impl Into<String>) -> Self {
        Self {
            backend,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl PlanRepository for BackendPlanRepository {
    async fn list(&self, only_active: bool) -> Result<Vec<Plan>, AppError> {
        let mut query = self.backend.table(PLANS_TABLE).select("*");
        if only_active {
            query = query.is_true("activo");
        }
        query.order("id", true).fetch().await
    }

    async fn get(&self, id: i64) -> Result<Option<Plan>, AppError> {
        self.backend
            .table(PLANS_TABLE)
            .select("*")
            .eq("id", id)
            .fetch_optional()
            .await
    }

    async fn create(&self, plan: &NewPlan) -> Result<Plan, AppError> {
        let rows: Vec<Plan> = self.backend.table(PLANS_TABLE).insert(plan).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Forbidden("El plan no fue creado".to_string()))
    }

    async fn update(&self, id: i64, changes: &PlanChanges) -> Result<Plan, AppError> {
        let rows: Vec<Plan> = self
            .backend
            .table(PLANS_TABLE)
            .eq("id", id)
            .update(changes)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Plan {id} no encontrado")))
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.backend.table(PLANS_TABLE).eq("id", id).delete().await
    }

    async fn upload_image(&self, path: &str, body: Bytes, content_type: &str) -> Result<String, AppError> {
        self.backend
            .upload_object(&self.bucket, path, body, content_type)
            .await?;
        Ok(self.backend.public_url(&self.bucket, path))
    }
}
