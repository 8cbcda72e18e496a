use async_trait::async_trait;
use uuid::Uuid;

use crate::backend::BackendClient;
use crate::errors::AppError;
use crate::models::contract::ContractResolution;
use crate::models::{ContractRequest, ContractStatus, NewContractRequest};

const CONTRACTS_TABLE: &str = "contrataciones";
/// Contract row with the plan and the requesting customer embedded.
const CONTRACT_COLUMNS: &str = "*,plan:plan_id(*),user_profile:user_id(id,name,telefono)";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContractFilter {
    pub user_id: Option<Uuid>,
    pub plan_id: Option<i64>,
    pub status: Option<ContractStatus>,
}

#[async_trait]
pub trait ContractRepository: Send + Sync {
    /// Matching requests, newest first.
    async fn list(&self, filter: &ContractFilter) -> Result<Vec<ContractRequest>, AppError>;

    async fn get(&self, id: i64) -> Result<Option<ContractRequest>, AppError>;

    async fn create(&self, request: &NewContractRequest) -> Result<ContractRequest, AppError>;

    /// Applies `resolution` only if the request is still pending. Returns
    /// `None` when nothing was pending under that id.
    async fn resolve(
        &self,
        id: i64,
        resolution: &ContractResolution,
    ) -> Result<Option<ContractRequest>, AppError>;
}

pub struct BackendContractRepository {
    backend: BackendClient,
}

impl BackendContractRepository {
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl ContractRepository for BackendContractRepository {
    async fn list(&self, filter: &ContractFilter) -> Result<Vec<ContractRequest>, AppError> {
        let mut query = self.backend.table(CONTRACTS_TABLE).select(CONTRACT_COLUMNS);
        if let Some(user_id) = filter.user_id {
            query = query.eq("user_id", user_id);
        }
        if let Some(plan_id) = filter.plan_id {
            query = query.eq("plan_id", plan_id);
        }
        if let Some(status) = filter.status {
            query = query.eq("estado", status);
        }
        query.order("fecha_solicitud", false).fetch().await
    }

    async fn get(&self, id: i64) -> Result<Option<ContractRequest>, AppError> {
        self.backend
            .table(CONTRACTS_TABLE)
            .select(CONTRACT_COLUMNS)
            .eq("id", id)
            .fetch_optional()
            .await
    }

    async fn create(&self, request: &NewContractRequest) -> Result<ContractRequest, AppError> {
        let rows: Vec<ContractRequest> = self
            .backend
            .table(CONTRACTS_TABLE)
            .select(CONTRACT_COLUMNS)
            .insert(request)
            .await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Forbidden("La solicitud no fue registrada".to_string()))
    }

    async fn resolve(
        &self,
        id: i64,
        resolution: &ContractResolution,
    ) -> Result<Option<ContractRequest>, AppError> {
        let rows: Vec<ContractRequest> = self
            .backend
            .table(CONTRACTS_TABLE)
            .select(CONTRACT_COLUMNS)
            .eq("id", id)
            .eq("estado", ContractStatus::Pending)
            .update(resolution)
            .await?;
        Ok(rows.into_iter().next())
    }
}
