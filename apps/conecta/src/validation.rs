//! Guard clauses run before any backend call.
//!
//! Every function returns `AppError::Validation` with the message shown to the
//! user. Lengths are counted in characters after trimming.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{NewPlan, PlanChanges};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;
pub const MIN_PHONE_LEN: usize = 7;
pub const MIN_PLAN_NAME_LEN: usize = 3;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid"));

/// Fields collected by the registration form.
#[derive(Debug, Clone, Default)]
pub struct Registration<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub full_name: &'a str,
    pub phone: &'a str,
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

fn require(value: &str, message: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(message));
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    require(email, "El correo electrónico es obligatorio")?;
    if !is_valid_email(email) {
        return Err(AppError::validation("El correo electrónico no es válido"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    require(password, "La contraseña es obligatoria")?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "La contraseña debe tener al menos {MIN_PASSWORD_LEN} caracteres"
        )));
    }
    Ok(())
}

fn validate_name(full_name: &str) -> Result<(), AppError> {
    require(full_name, "El nombre es obligatorio")?;
    if char_len(full_name) < MIN_NAME_LEN {
        return Err(AppError::validation(format!(
            "El nombre debe tener al menos {MIN_NAME_LEN} caracteres"
        )));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), AppError> {
    require(phone, "El teléfono es obligatorio")?;
    if char_len(phone) < MIN_PHONE_LEN {
        return Err(AppError::validation(format!(
            "El teléfono debe tener al menos {MIN_PHONE_LEN} dígitos"
        )));
    }
    Ok(())
}

/// Registration: all four fields required, then format and minimum lengths.
pub fn validate_registration(input: &Registration<'_>) -> Result<(), AppError> {
    if input.email.trim().is_empty()
        || input.password.is_empty()
        || input.full_name.trim().is_empty()
        || input.phone.trim().is_empty()
    {
        return Err(AppError::validation("Todos los campos son obligatorios"));
    }
    validate_email(input.email)?;
    validate_password(input.password)?;
    validate_name(input.full_name)?;
    validate_phone(input.phone)?;
    Ok(())
}

/// Login checks presence and the `@`; the backend decides whether the pair is valid.
pub fn validate_login(email: &str, password: &str) -> Result<(), AppError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::validation(
            "El correo y la contraseña son obligatorios",
        ));
    }
    if !email.contains('@') {
        return Err(AppError::validation("Email inválido"));
    }
    Ok(())
}

pub fn validate_profile(full_name: &str, phone: &str) -> Result<(), AppError> {
    validate_name(full_name)?;
    validate_phone(phone)?;
    Ok(())
}

/// Returns the sender and receiver ids once both are known to be present.
pub fn validate_message(
    sender_id: Option<Uuid>,
    receiver_id: Option<Uuid>,
    content: &str,
) -> Result<(Uuid, Uuid), AppError> {
    let (sender, receiver) = match (sender_id, receiver_id) {
        (Some(s), Some(r)) => (s, r),
        _ => {
            return Err(AppError::validation(
                "Faltan el remitente o el destinatario del mensaje",
            ))
        }
    };
    if sender == receiver {
        return Err(AppError::validation("No puedes enviarte mensajes a ti mismo"));
    }
    require(content, "El mensaje no puede estar vacío")?;
    Ok((sender, receiver))
}

pub fn validate_new_plan(plan: &NewPlan) -> Result<(), AppError> {
    require(&plan.name, "El nombre del plan es obligatorio")?;
    validate_price(plan.price)?;
    require(&plan.data_allowance, "Los datos del plan son obligatorios")?;
    require(&plan.minutes, "Los minutos del plan son obligatorios")?;
    Ok(())
}

pub fn validate_plan_changes(changes: &PlanChanges) -> Result<(), AppError> {
    if changes.is_empty() {
        return Err(AppError::validation("No hay cambios para guardar"));
    }
    if let Some(name) = &changes.name {
        require(name, "El nombre del plan es obligatorio")?;
        if char_len(name) < MIN_PLAN_NAME_LEN {
            return Err(AppError::validation("El nombre es muy corto"));
        }
    }
    if let Some(price) = changes.price {
        validate_price(price)?;
    }
    if let Some(data) = &changes.data_allowance {
        require(data, "Los datos del plan son obligatorios")?;
    }
    if let Some(minutes) = &changes.minutes {
        require(minutes, "Los minutos del plan son obligatorios")?;
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(AppError::validation("El precio debe ser mayor a cero"));
    }
    Ok(())
}
