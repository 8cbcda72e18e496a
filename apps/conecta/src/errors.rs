use thiserror::Error;

/// Application-level error type.
///
/// `Validation` is raised before any remote call is made. Every other variant
/// originates from the backend or the transport and is surfaced to the user
/// through [`AppError::user_message`]; none of them is retried.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Backend error (status {status}): {message}")]
    Backend { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Realtime error: {0}")]
    Realtime(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// True for failures detected locally, before the backend was contacted.
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }

    /// Text shown to the user in an alert. Backend failures keep the
    /// remote-provided message; transport failures get a generic one.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Unauthorized => "Tu sesión no es válida. Inicia sesión de nuevo.".to_string(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::InvalidTransition(msg) => msg.clone(),
            AppError::Backend { message, .. } => message.clone(),
            AppError::Http(e) => {
                tracing::error!("HTTP error: {e}");
                "No se pudo conectar con el servidor.".to_string()
            }
            AppError::Realtime(msg) => {
                tracing::error!("Realtime error: {msg}");
                "Se perdió la conexión del chat.".to_string()
            }
            AppError::Parse(e) => {
                tracing::error!("Parse error: {e}");
                "Respuesta inesperada del servidor.".to_string()
            }
            AppError::Io(e) => {
                tracing::error!("I/O error: {e}");
                "Error de almacenamiento local.".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "Ocurrió un error inesperado.".to_string()
            }
        }
    }
}
