use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::info;

use crate::auth::service::ensure_role;
use crate::backend::storage::content_type_for;
use crate::errors::AppError;
use crate::models::{NewPlan, Plan, PlanChanges, Profile, Role};
use crate::plans::repository::PlanRepository;
use crate::validation::{validate_new_plan, validate_plan_changes};

const ADVISOR_ONLY: &str = "Solo un asesor comercial puede administrar el catálogo";

pub struct PlanService {
    plans: Arc<dyn PlanRepository>,
}

impl PlanService {
    pub fn new(plans: Arc<dyn PlanRepository>) -> Self {
        Self { plans }
    }

    /// Catalog as seen by `actor`: advisors see every plan, customers only
    /// the active ones.
    pub async fn list_for(&self, actor: &Profile) -> Result<Vec<Plan>, AppError> {
        self.plans.list(actor.role == Role::Customer).await
    }

    /// Public catalog, also available before signing in.
    pub async fn list_active(&self) -> Result<Vec<Plan>, AppError> {
        self.plans.list(true).await
    }

    pub async fn get(&self, id: i64) -> Result<Plan, AppError> {
        self.plans
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Plan {id} no encontrado")))
    }

    pub async fn create(&self, actor: &Profile, plan: NewPlan) -> Result<Plan, AppError> {
        ensure_role(actor, Role::Advisor, ADVISOR_ONLY)?;
        validate_new_plan(&plan)?;
        let plan = NewPlan {
            name: plan.name.trim().to_string(),
            data_allowance: plan.data_allowance.trim().to_string(),
            minutes: plan.minutes.trim().to_string(),
            description: non_blank(plan.description),
            promotion: non_blank(plan.promotion),
            image_url: non_blank(plan.image_url),
            ..plan
        };
        let created = self.plans.create(&plan).await?;
        info!("Advisor {} created plan {} ({})", actor.id, created.id, created.name);
        Ok(created)
    }

    pub async fn update(
        &self,
        actor: &Profile,
        id: i64,
        changes: PlanChanges,
    ) -> Result<Plan, AppError> {
        ensure_role(actor, Role::Advisor, ADVISOR_ONLY)?;
        validate_plan_changes(&changes)?;
        let changes = PlanChanges {
            name: changes.name.map(|s| s.trim().to_string()),
            data_allowance: changes.data_allowance.map(|s| s.trim().to_string()),
            minutes: changes.minutes.map(|s| s.trim().to_string()),
            ..changes
        };
        let updated = self.plans.update(id, &changes).await?;
        info!("Advisor {} updated plan {}", actor.id, id);
        Ok(updated)
    }

    /// Soft toggle: inactive plans stay in the catalog for advisors.
    pub async fn set_active(&self, actor: &Profile, id: i64, active: bool) -> Result<Plan, AppError> {
        self.update(
            actor,
            id,
            PlanChanges {
                active: Some(active),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(&self, actor: &Profile, id: i64) -> Result<(), AppError> {
        ensure_role(actor, Role::Advisor, ADVISOR_ONLY)?;
        self.plans.delete(id).await?;
        info!("Advisor {} deleted plan {}", actor.id, id);
        Ok(())
    }

    /// Uploads a plan image and returns its public URL. Objects are named
    /// by upload time, so a plan not created yet can have one too.
    pub async fn upload_image(
        &self,
        actor: &Profile,
        file_name: &str,
        body: Bytes,
    ) -> Result<String, AppError> {
        ensure_role(actor, Role::Advisor, ADVISOR_ONLY)?;
        if file_name.trim().is_empty() {
            return Err(AppError::validation("El nombre del archivo es obligatorio"));
        }
        if body.is_empty() {
            return Err(AppError::validation("La imagen está vacía"));
        }
        let path = image_object_path(file_name, Utc::now().timestamp_millis());
        self.plans
            .upload_image(&path, body, content_type_for(&path))
            .await
    }

    /// Uploads an image and stores its URL on the plan.
    pub async fn attach_image(
        &self,
        actor: &Profile,
        plan_id: i64,
        file_name: &str,
        body: Bytes,
    ) -> Result<Plan, AppError> {
        let url = self.upload_image(actor, file_name, body).await?;
        self.update(
            actor,
            plan_id,
            PlanChanges {
                image_url: Some(url),
                ..Default::default()
            },
        )
        .await
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `planes/plan_<millis>.<ext>`, keeping the local file's extension
/// (lowercased) and falling back to `jpg`.
fn image_object_path(file_name: &str, millis: i64) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let extension = base
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "jpg".to_string());
    format!("planes/plan_{millis}.{extension}")
}
