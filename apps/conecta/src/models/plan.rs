use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `planes_moviles` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    /// Monthly price in local currency.
    #[serde(rename = "precio")]
    pub price: f64,
    #[serde(rename = "datos_gb")]
    pub data_allowance: String,
    #[serde(rename = "minutos")]
    pub minutes: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "promocion", default)]
    pub promotion: Option<String>,
    #[serde(rename = "imagen_url", default)]
    pub image_url: Option<String>,
    #[serde(rename = "activo", default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

/// Insert payload for a new plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewPlan {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "precio")]
    pub price: f64,
    #[serde(rename = "datos_gb")]
    pub data_allowance: String,
    #[serde(rename = "minutos")]
    pub minutes: String,
    #[serde(rename = "descripcion", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "promocion", skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
    #[serde(rename = "imagen_url", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "activo")]
    pub active: bool,
}

/// Partial update. Only the fields that are `Some` are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanChanges {
    #[serde(rename = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "precio", skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(rename = "datos_gb", skip_serializing_if = "Option::is_none")]
    pub data_allowance: Option<String>,
    #[serde(rename = "minutos", skip_serializing_if = "Option::is_none")]
    pub minutes: Option<String>,
    #[serde(rename = "descripcion", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "promocion", skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
    #[serde(rename = "imagen_url", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "activo", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl PlanChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.data_allowance.is_none()
            && self.minutes.is_none()
            && self.description.is_none()
            && self.promotion.is_none()
            && self.image_url.is_none()
            && self.active.is_none()
    }

    /// Applies the changes to a local copy, mirroring what the backend stores.
    pub fn apply_to(&self, plan: &mut Plan) {
        if let Some(name) = &self.name {
            plan.name = name.clone();
        }
        if let Some(price) = self.price {
            plan.price = price;
        }
        if let Some(data) = &self.data_allowance {
            plan.data_allowance = data.clone();
        }
        if let Some(minutes) = &self.minutes {
            plan.minutes = minutes.clone();
        }
        if let Some(description) = &self.description {
            plan.description = Some(description.clone());
        }
        if let Some(promotion) = &self.promotion {
            plan.promotion = Some(promotion.clone());
        }
        if let Some(url) = &self.image_url {
            plan.image_url = Some(url.clone());
        }
        if let Some(active) = self.active {
            plan.active = active;
        }
    }
}
