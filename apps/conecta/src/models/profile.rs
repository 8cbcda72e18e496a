use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two fixed roles of the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Role {
    /// Browses plans, requests contracts, chats with an advisor.
    #[default]
    #[serde(rename = "usuario_registrado")]
    Customer,
    /// Manages the plan catalog and resolves contract requests.
    #[serde(rename = "asesor_comercial")]
    Advisor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "usuario_registrado",
            Role::Advisor => "asesor_comercial",
        }
    }

    /// The role on the other side of a chat.
    pub fn counterpart(&self) -> Role {
        match self {
            Role::Customer => Role::Advisor,
            Role::Advisor => Role::Customer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row of the `profiles` table. `id` is the auth user id. The row is created
/// by a backend trigger on sign-up; `email` comes from the auth user, not
/// from the table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default, skip_serializing)]
    pub email: Option<String>,
    #[serde(rename = "name")]
    pub full_name: String,
    #[serde(rename = "telefono", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileChanges {
    #[serde(rename = "name")]
    pub full_name: String,
    #[serde(rename = "telefono")]
    pub phone: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_deserializes_backend_columns() {
        let row = serde_json::json!({
            "id": "6f1c4c1e-7d8a-4c55-9d7e-3f1f1b0d2a10",
            "name": "Ana Pérez",
            "telefono": "77712345",
            "role": "asesor_comercial"
        });
        let profile: Profile = serde_json::from_value(row).unwrap();
        assert_eq!(profile.role, Role::Advisor);
        assert_eq!(profile.full_name, "Ana Pérez");
        assert!(profile.email.is_none());
    }

    #[test]
    fn test_changes_use_profile_columns() {
        let changes = ProfileChanges {
            full_name: "Luis".to_string(),
            phone: "71234567".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&changes).unwrap(),
            serde_json::json!({ "name": "Luis", "telefono": "71234567" })
        );
    }

    #[test]
    fn test_counterpart() {
        assert_eq!(Role::Customer.counterpart(), Role::Advisor);
        assert_eq!(Role::Advisor.counterpart(), Role::Customer);
    }
}
