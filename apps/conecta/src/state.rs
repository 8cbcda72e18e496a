use std::sync::Arc;

use crate::auth::{AuthService, BackendAuthRepository, BackendProfileRepository, ProfileRepository};
use crate::backend::BackendClient;
use crate::chat::{BackendChatRepository, ChatService};
use crate::config::Config;
use crate::contracts::{BackendContractRepository, ContractRepository, ContractService};
use crate::errors::AppError;
use crate::plans::{BackendPlanRepository, PlanRepository, PlanService};
use crate::session::SessionStore;

/// Everything a front end needs: the shared session and one provider per
/// feature, all wired to the same backend client.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub session: Arc<SessionStore>,
    pub backend: BackendClient,
    pub auth: Arc<AuthService>,
    pub plans: Arc<PlanService>,
    pub contracts: Arc<ContractService>,
    pub chat: Arc<ChatService>,
}

impl AppState {
    /// Builds the providers and restores a persisted session, if any.
    pub async fn init(config: Config) -> Result<Self, AppError> {
        let session = Arc::new(SessionStore::new(config.session_file.clone()));
        session.restore().await?;
        Self::with_session(config, session)
    }

    pub fn with_session(config: Config, session: Arc<SessionStore>) -> Result<Self, AppError> {
        let backend = BackendClient::new(&config, session.clone())?;

        let profiles: Arc<dyn ProfileRepository> =
            Arc::new(BackendProfileRepository::new(backend.clone()));
        let plan_repo: Arc<dyn PlanRepository> = Arc::new(BackendPlanRepository::new(
            backend.clone(),
            config.storage_bucket.clone(),
        ));

        let contract_repo: Arc<dyn ContractRepository> =
            Arc::new(BackendContractRepository::new(backend.clone()));

        let auth = AuthService::new(
            Arc::new(BackendAuthRepository::new(backend.clone())),
            profiles.clone(),
        );
        let plans = PlanService::new(plan_repo.clone());
        let contracts = ContractService::new(contract_repo.clone(), plan_repo);
        let chat = ChatService::new(
            Arc::new(BackendChatRepository::new(backend.clone())),
            profiles,
            contract_repo,
        );

        Ok(Self {
            config,
            session,
            backend,
            auth: Arc::new(auth),
            plans: Arc::new(plans),
            contracts: Arc::new(contracts),
            chat: Arc::new(chat),
        })
    }
}
