//! In-memory repositories for service tests.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::{AuthRepository, ProfileRepository};
use crate::backend::auth::SignUpResult;
use crate::chat::{ChatRepository, MessageFeed};
use crate::contracts::{ContractFilter, ContractRepository};
use crate::errors::AppError;
use crate::models::contract::ContractResolution;
use crate::models::{
    ContractRequest, ContractStatus, Message, NewContractRequest, NewMessage, NewPlan, Plan,
    PlanChanges, Profile, ProfileChanges, RequesterSummary, Role,
};
use crate::plans::PlanRepository;
use crate::session::{test_session, AuthUser, Session};

pub fn profile(role: Role) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        email: Some(format!("{}@tigo.com.bo", role.as_str())),
        full_name: match role {
            Role::Customer => "Luis Rojas".to_string(),
            Role::Advisor => "Ana Pérez".to_string(),
        },
        phone: Some("71234567".to_string()),
        role,
    }
}

static NEXT_ID: AtomicI64 = AtomicI64::new(1);

/// Process-wide sequence standing in for the backend's serial ids.
pub fn next_id() -> i64 {
    NEXT_ID.fetch_add(1, Ordering::SeqCst)
}

pub fn plan(active: bool) -> Plan {
    Plan {
        id: next_id(),
        name: "Plan Full 25".to_string(),
        price: 149.0,
        data_allowance: "25 GB".to_string(),
        minutes: "Ilimitados".to_string(),
        description: None,
        promotion: None,
        image_url: None,
        active,
        created_at: None,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Auth
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeAuth {
    pub calls: AtomicUsize,
    pub session: Mutex<Option<Session>>,
    /// When set, sign-up returns a pending confirmation instead of a session.
    pub require_confirmation: bool,
    pub last_metadata: Mutex<Option<Value>>,
    pub last_password: Mutex<Option<String>>,
    pub reset_emails: Mutex<Vec<String>>,
    /// User metadata attached to sessions returned by sign-in.
    pub sign_in_metadata: Mutex<Value>,
}

impl FakeAuth {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn signed_in_as(user_id: Uuid) -> Self {
        let fake = Self::default();
        *fake.session.lock().unwrap() = Some(test_session(user_id));
        fake
    }

    pub fn set_metadata(&self, metadata: Value) {
        *self.sign_in_metadata.lock().unwrap() = metadata;
    }
}

#[async_trait]
impl AuthRepository for FakeAuth {
    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        metadata: &Value,
    ) -> Result<SignUpResult, AppError> {
        self.hit();
        *self.last_metadata.lock().unwrap() = Some(metadata.clone());
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            user_metadata: metadata.clone(),
        };
        if self.require_confirmation {
            return Ok(SignUpResult::ConfirmationPending(user));
        }
        let mut session = test_session(user.id);
        session.user = user;
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(SignUpResult::SignedIn(session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AppError> {
        self.hit();
        if password != "secreto1" {
            return Err(AppError::Backend {
                status: 400,
                message: "Invalid login credentials".to_string(),
            });
        }
        let mut session = test_session(Uuid::new_v4());
        session.user.email = Some(email.to_string());
        session.user.user_metadata = self.sign_in_metadata.lock().unwrap().clone();
        *self.session.lock().unwrap() = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.hit();
        *self.session.lock().unwrap() = None;
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, _redirect_to: Option<&str>) -> Result<(), AppError> {
        self.hit();
        self.reset_emails.lock().unwrap().push(email.to_string());
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> Result<(), AppError> {
        self.hit();
        if self.session.lock().unwrap().is_none() {
            return Err(AppError::Unauthorized);
        }
        *self.last_password.lock().unwrap() = Some(new_password.to_string());
        Ok(())
    }

    async fn current_session(&self) -> Result<Option<Session>, AppError> {
        Ok(self.session.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeProfiles {
    pub rows: Mutex<Vec<Profile>>,
    pub calls: AtomicUsize,
}

impl FakeProfiles {
    pub fn with(rows: Vec<Profile>) -> Self {
        Self {
            rows: Mutex::new(rows),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileRepository for FakeProfiles {
    async fn get(&self, id: Uuid) -> Result<Option<Profile>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn update(&self, id: Uuid, changes: &ProfileChanges) -> Result<Profile, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Perfil {id} no encontrado")))?;
        row.full_name = changes.full_name.clone();
        row.phone = Some(changes.phone.clone());
        Ok(row.clone())
    }

    async fn list_by_role(&self, role: Role) -> Result<Vec<Profile>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.role == role)
            .cloned()
            .collect())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Plans
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakePlans {
    pub rows: Mutex<Vec<Plan>>,
    pub uploads: Mutex<Vec<(String, usize, String)>>,
    pub calls: AtomicUsize,
}

impl FakePlans {
    pub fn with(rows: Vec<Plan>) -> Self {
        Self {
            rows: Mutex::new(rows),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlanRepository for FakePlans {
    async fn list(&self, only_active: bool) -> Result<Vec<Plan>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rows: Vec<Plan> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !only_active || p.active)
            .cloned()
            .collect();
        rows.sort_by_key(|p| p.id);
        Ok(rows)
    }

    async fn get(&self, id: i64) -> Result<Option<Plan>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn create(&self, new: &NewPlan) -> Result<Plan, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let plan = Plan {
            id: next_id(),
            name: new.name.clone(),
            price: new.price,
            data_allowance: new.data_allowance.clone(),
            minutes: new.minutes.clone(),
            description: new.description.clone(),
            promotion: new.promotion.clone(),
            image_url: new.image_url.clone(),
            active: new.active,
            created_at: Some(Utc::now()),
        };
        self.rows.lock().unwrap().push(plan.clone());
        Ok(plan)
    }

    async fn update(&self, id: i64, changes: &PlanChanges) -> Result<Plan, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Plan {id} no encontrado")))?;
        changes.apply_to(row);
        Ok(row.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().retain(|p| p.id != id);
        Ok(())
    }

    async fn upload_image(&self, path: &str, body: Bytes, content_type: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), body.len(), content_type.to_string()));
        Ok(format!("https://cdn.test/planes-imagenes/{path}"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Contracts
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeContracts {
    pub rows: Mutex<Vec<ContractRequest>>,
    pub calls: AtomicUsize,
}

impl FakeContracts {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn insert_row(&self, user_id: Uuid, plan_id: i64, status: ContractStatus) -> ContractRequest {
        let row = ContractRequest {
            id: next_id(),
            user_id,
            plan_id,
            status,
            requested_at: Utc::now(),
            responded_at: None,
            plan: None,
            requester: None,
        };
        self.rows.lock().unwrap().push(row.clone());
        row
    }

    /// Inserts a pending request carrying the joined requester summary.
    pub fn insert_from(&self, requester: &Profile, plan_id: i64) -> ContractRequest {
        let mut row = self.insert_row(requester.id, plan_id, ContractStatus::Pending);
        row.requester = Some(RequesterSummary {
            id: requester.id,
            full_name: requester.full_name.clone(),
            phone: requester.phone.clone(),
        });
        let mut rows = self.rows.lock().unwrap();
        if let Some(stored) = rows.iter_mut().find(|c| c.id == row.id) {
            *stored = row.clone();
        }
        row
    }
}

#[async_trait]
impl ContractRepository for FakeContracts {
    async fn list(&self, filter: &ContractFilter) -> Result<Vec<ContractRequest>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rows: Vec<ContractRequest> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| filter.user_id.map_or(true, |u| c.user_id == u))
            .filter(|c| filter.plan_id.map_or(true, |p| c.plan_id == p))
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(rows)
    }

    async fn get(&self, id: i64) -> Result<Option<ContractRequest>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.lock().unwrap().iter().find(|c| c.id == id).cloned())
    }

    async fn create(&self, request: &NewContractRequest) -> Result<ContractRequest, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let row = ContractRequest {
            id: next_id(),
            user_id: request.user_id,
            plan_id: request.plan_id,
            status: ContractStatus::Pending,
            requested_at: Utc::now(),
            responded_at: None,
            plan: None,
            requester: None,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn resolve(
        &self,
        id: i64,
        resolution: &ContractResolution,
    ) -> Result<Option<ContractRequest>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .iter_mut()
            .find(|c| c.id == id && c.status == ContractStatus::Pending)
        else {
            return Ok(None);
        };
        row.status = resolution.status;
        row.responded_at = Some(resolution.responded_at);
        Ok(Some(row.clone()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Chat
// ────────────────────────────────────────────────────────────────────────────

/// Stores messages and echoes every sent message to open feeds, the way the
/// backend's realtime channel does.
#[derive(Default)]
pub struct FakeChat {
    pub rows: Mutex<Vec<Message>>,
    pub feeds: Mutex<Vec<mpsc::Sender<Message>>>,
    pub unsubscribed: std::sync::Arc<AtomicUsize>,
    pub calls: AtomicUsize,
}

impl FakeChat {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Simulates an insert made by another client.
    pub fn deliver(&self, message: Message) {
        self.rows.lock().unwrap().push(message.clone());
        for feed in self.feeds.lock().unwrap().iter() {
            let _ = feed.try_send(message.clone());
        }
    }
}

#[async_trait]
impl ChatRepository for FakeChat {
    async fn history(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.involves_pair(a, b))
            .cloned()
            .collect())
    }

    async fn send(&self, message: &NewMessage) -> Result<Message, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stored = Message {
            id: next_id(),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content.clone(),
            created_at: Utc::now(),
        };
        self.deliver(stored.clone());
        Ok(stored)
    }

    async fn subscribe(&self) -> Result<MessageFeed, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        self.feeds.lock().unwrap().push(tx);
        let unsubscribed = self.unsubscribed.clone();
        Ok(MessageFeed::new(rx, move || {
            unsubscribed.fetch_add(1, Ordering::SeqCst);
        }))
    }
}
