use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::plan::Plan;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ContractStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "aprobado")]
    Approved,
    #[serde(rename = "rechazado")]
    Rejected,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::Pending => "pendiente",
            ContractStatus::Approved => "aprobado",
            ContractStatus::Rejected => "rechazado",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ContractStatus::Pending)
    }

    /// Only `Pending -> Approved` and `Pending -> Rejected` exist.
    pub fn can_transition_to(&self, next: ContractStatus) -> bool {
        *self == ContractStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requesting customer as projected by the `user_profile:user_id(...)` join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequesterSummary {
    pub id: Uuid,
    #[serde(rename = "name")]
    pub full_name: String,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
}

/// Row of the `contrataciones` table, with the joined plan and requester.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractRequest {
    pub id: i64,
    pub user_id: Uuid,
    pub plan_id: i64,
    #[serde(rename = "estado")]
    pub status: ContractStatus,
    #[serde(rename = "fecha_solicitud")]
    pub requested_at: DateTime<Utc>,
    #[serde(rename = "fecha_respuesta", default)]
    pub responded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing)]
    pub plan: Option<Plan>,
    #[serde(rename = "user_profile", default, skip_serializing)]
    pub requester: Option<RequesterSummary>,
}

/// Insert payload. Status and request date are filled by column defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewContractRequest {
    pub user_id: Uuid,
    pub plan_id: i64,
}

/// Update payload that moves a pending request to a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractResolution {
    #[serde(rename = "estado")]
    pub status: ContractStatus,
    #[serde(rename = "fecha_respuesta")]
    pub responded_at: DateTime<Utc>,
}
