use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::auth::service::ensure_role;
use crate::contracts::repository::{ContractFilter, ContractRepository};
use crate::errors::AppError;
use crate::models::contract::ContractResolution;
use crate::models::{ContractRequest, ContractStatus, NewContractRequest, Profile, Role};
use crate::plans::PlanRepository;

pub struct ContractService {
    contracts: Arc<dyn ContractRepository>,
    plans: Arc<dyn PlanRepository>,
}

impl ContractService {
    pub fn new(contracts: Arc<dyn ContractRepository>, plans: Arc<dyn PlanRepository>) -> Self {
        Self { contracts, plans }
    }

    /// Customer asks to contract `plan_id`. The plan must exist and be
    /// active, and the customer may hold one pending request per plan.
    pub async fn request(&self, actor: &Profile, plan_id: i64) -> Result<ContractRequest, AppError> {
        ensure_role(
            actor,
            Role::Customer,
            "Solo los clientes pueden solicitar un plan",
        )?;

        let plan = self
            .plans
            .get(plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Plan {plan_id} no encontrado")))?;
        if !plan.active {
            return Err(AppError::validation("Este plan ya no está disponible"));
        }

        let pending = self
            .contracts
            .list(&ContractFilter {
                user_id: Some(actor.id),
                plan_id: Some(plan_id),
                status: Some(ContractStatus::Pending),
            })
            .await?;
        if !pending.is_empty() {
            return Err(AppError::validation(
                "Ya tienes una solicitud pendiente para este plan",
            ));
        }

        let created = self
            .contracts
            .create(&NewContractRequest {
                user_id: actor.id,
                plan_id,
            })
            .await?;
        info!("Customer {} requested plan {} ({})", actor.id, plan.name, created.id);
        Ok(created)
    }

    /// Customers see their own requests; advisors see everyone's.
    pub async fn list_for(
        &self,
        actor: &Profile,
        status: Option<ContractStatus>,
    ) -> Result<Vec<ContractRequest>, AppError> {
        let filter = ContractFilter {
            user_id: (actor.role == Role::Customer).then_some(actor.id),
            plan_id: None,
            status,
        };
        self.contracts.list(&filter).await
    }

    pub async fn approve(&self, actor: &Profile, id: i64) -> Result<ContractRequest, AppError> {
        self.resolve(actor, id, ContractStatus::Approved).await
    }

    pub async fn reject(&self, actor: &Profile, id: i64) -> Result<ContractRequest, AppError> {
        self.resolve(actor, id, ContractStatus::Rejected).await
    }

    async fn resolve(
        &self,
        actor: &Profile,
        id: i64,
        next: ContractStatus,
    ) -> Result<ContractRequest, AppError> {
        ensure_role(
            actor,
            Role::Advisor,
            "Solo un asesor comercial puede responder solicitudes",
        )?;

        let current = self
            .contracts
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Solicitud {id} no encontrada")))?;
        if !current.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "La solicitud ya fue {}",
                current.status
            )));
        }

        let resolution = ContractResolution {
            status: next,
            responded_at: Utc::now(),
        };
        // Conditional on still being pending; another advisor may have won.
        let resolved = self
            .contracts
            .resolve(id, &resolution)
            .await?
            .ok_or_else(|| {
                AppError::InvalidTransition("La solicitud ya fue respondida por otro asesor".to_string())
            })?;
        info!("Advisor {} marked request {} as {}", actor.id, id, next);
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::testing::{plan, profile, FakeContracts, FakePlans};

    struct Fixture {
        svc: ContractService,
        contracts: Arc<FakeContracts>,
        active_plan: i64,
        inactive_plan: i64,
    }

    fn fixture() -> Fixture {
        let active = plan(true);
        let inactive = plan(false);
        let contracts = Arc::new(FakeContracts::default());
        let plans = Arc::new(FakePlans::with(vec![active.clone(), inactive.clone()]));
        Fixture {
            svc: ContractService::new(contracts.clone(), plans),
            contracts,
            active_plan: active.id,
            inactive_plan: inactive.id,
        }
    }

    #[tokio::test]
    async fn test_customer_requests_active_plan() {
        let f = fixture();
        let customer = profile(Role::Customer);
        let created = f.svc.request(&customer, f.active_plan).await.unwrap();
        assert_eq!(created.status, ContractStatus::Pending);
        assert_eq!(created.user_id, customer.id);
        assert!(created.responded_at.is_none());
    }

    #[tokio::test]
    async fn test_request_rejects_inactive_unknown_and_duplicate() {
        let f = fixture();
        let customer = profile(Role::Customer);
        assert!(f
            .svc
            .request(&customer, f.inactive_plan)
            .await
            .unwrap_err()
            .is_validation());
        assert!(matches!(
            f.svc.request(&customer, i64::MAX).await,
            Err(AppError::NotFound(_))
        ));

        f.svc.request(&customer, f.active_plan).await.unwrap();
        assert!(f
            .svc
            .request(&customer, f.active_plan)
            .await
            .unwrap_err()
            .is_validation());
    }

    #[tokio::test]
    async fn test_advisor_cannot_request() {
        let f = fixture();
        let err = f
            .svc
            .request(&profile(Role::Advisor), f.active_plan)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(f.contracts.calls(), 0);
    }

    #[tokio::test]
    async fn test_list_scoped_by_role() {
        let f = fixture();
        let alice = profile(Role::Customer);
        let bob = profile(Role::Customer);
        f.contracts.insert_row(alice.id, f.active_plan, ContractStatus::Pending);
        f.contracts.insert_row(bob.id, f.active_plan, ContractStatus::Approved);

        assert_eq!(f.svc.list_for(&alice, None).await.unwrap().len(), 1);
        let advisor = profile(Role::Advisor);
        assert_eq!(f.svc.list_for(&advisor, None).await.unwrap().len(), 2);
        assert_eq!(
            f.svc
                .list_for(&advisor, Some(ContractStatus::Pending))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_approve_sets_response_fields() {
        let f = fixture();
        let row = f
            .contracts
            .insert_row(Uuid::new_v4(), f.active_plan, ContractStatus::Pending);
        let advisor = profile(Role::Advisor);

        let approved = f.svc.approve(&advisor, row.id).await.unwrap();
        assert_eq!(approved.status, ContractStatus::Approved);
        assert!(approved.responded_at.is_some());
        assert_eq!(approved.requested_at, row.requested_at);
    }

    #[tokio::test]
    async fn test_terminal_request_cannot_transition_again() {
        let f = fixture();
        let row = f
            .contracts
            .insert_row(Uuid::new_v4(), f.active_plan, ContractStatus::Pending);
        let advisor = profile(Role::Advisor);

        f.svc.reject(&advisor, row.id).await.unwrap();
        let stored = f.contracts.rows.lock().unwrap()[0].clone();
        assert_eq!(stored.status, ContractStatus::Rejected);

        let err = f.svc.approve(&advisor, row.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(msg) if msg.contains("rechazado")));
    }

    #[tokio::test]
    async fn test_customer_cannot_resolve() {
        let f = fixture();
        let customer = profile(Role::Customer);
        let row = f
            .contracts
            .insert_row(customer.id, f.active_plan, ContractStatus::Pending);
        assert!(matches!(
            f.svc.approve(&customer, row.id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_unknown_request() {
        let f = fixture();
        assert!(matches!(
            f.svc.reject(&profile(Role::Advisor), i64::MAX).await,
            Err(AppError::NotFound(_))
        ));
    }
}
