//! Sistema de manejo de errores
//!
//! Este módulo define todos los tipos de errores del cliente y la extracción
//! del mensaje que el backend devuelve en sus respuestas de error.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errores principales de la aplicación
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    /// Fallo de transporte: el gateway no respondió
    #[error("Network error: {0}")]
    Network(String),

    /// 401/403: la credencial ya no es válida
    #[error("Unauthorized (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Error de validación o conflicto reportado por el backend
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Vehicle '{0}' is not in the current snapshot")]
    UnknownVehicle(String),

    #[error("Vehicle '{id}' is not available (status {status})")]
    VehicleNotAvailable { id: String, status: String },

    #[error("Driver '{0}' has no active job")]
    NoActiveJob(String),

    #[error("Driver ID is mandatory.")]
    MissingDriverId,

    #[error("Login required")]
    NotLoggedIn,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Construye el error correspondiente a una respuesta HTTP no exitosa
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized {
                status: status.as_u16(),
            },
            StatusCode::NOT_FOUND => AppError::NotFound(extract_error_message(status, body)),
            _ => AppError::Rejected {
                status: status.as_u16(),
                message: extract_error_message(status, body),
            },
        }
    }

    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, AppError::Unauthorized { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Rechazos locales: el error se produjo antes de cualquier llamada de red
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            AppError::UnknownVehicle(_)
                | AppError::VehicleNotAvailable { .. }
                | AppError::NoActiveJob(_)
                | AppError::MissingDriverId
                | AppError::NotLoggedIn
        )
    }

    /// Texto que se muestra al operador
    ///
    /// Para los rechazos del backend es el mensaje tal cual lo envió el servidor.
    pub fn alert(&self) -> String {
        match self {
            AppError::Rejected { message, .. } => message.clone(),
            AppError::NotFound(message) => message.clone(),
            AppError::Network(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            AppError::Decode(error.to_string())
        } else {
            AppError::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        AppError::Decode(error.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Config(errors.to_string())
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Extrae el mensaje de error del cuerpo de la respuesta
///
/// Orden: `message` de un JSON, `error` de un JSON, cuerpo en texto plano,
/// la frase de estado HTTP y por último "Unknown Error".
pub fn extract_error_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();

    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        for key in ["message", "error"] {
            if let Some(message) = json.get(key).and_then(Value::as_str) {
                if !message.trim().is_empty() {
                    return message.to_string();
                }
            }
        }
        // Spring a veces devuelve el mensaje como un string JSON
        if let Some(message) = json.as_str() {
            if !message.trim().is_empty() {
                return message.to_string();
            }
        }
    } else if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| "Unknown Error".to_string())
}

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} not found: {}", resource, id))
}

/// Función helper para crear errores de conflicto del backend
pub fn conflict_error(message: &str) -> AppError {
    AppError::Rejected {
        status: StatusCode::CONFLICT.as_u16(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_from_json_message_field() {
        let msg = extract_error_message(
            StatusCode::CONFLICT,
            r#"{"message":"Vehicle v1 is not available","status":409}"#,
        );
        assert_eq!(msg, "Vehicle v1 is not available");
    }

    #[test]
    fn test_message_falls_back_to_error_field() {
        let msg = extract_error_message(StatusCode::BAD_REQUEST, r#"{"error":"Bad Request"}"#);
        assert_eq!(msg, "Bad Request");
    }

    #[test]
    fn test_message_from_plain_text_body() {
        let msg = extract_error_message(StatusCode::CONFLICT, "No available vehicle found.");
        assert_eq!(msg, "No available vehicle found.");
    }

    #[test]
    fn test_message_falls_back_to_reason_phrase() {
        let msg = extract_error_message(StatusCode::INTERNAL_SERVER_ERROR, "   ");
        assert_eq!(msg, "Internal Server Error");

        let msg = extract_error_message(StatusCode::BAD_GATEWAY, "{}");
        assert_eq!(msg, "Bad Gateway");
    }

    #[test]
    fn test_unknown_status_without_reason() {
        let status = StatusCode::from_u16(599).unwrap();
        assert_eq!(extract_error_message(status, ""), "Unknown Error");
    }

    #[test]
    fn test_status_mapping() {
        assert!(AppError::from_status(StatusCode::UNAUTHORIZED, "").is_authorization_failure());
        assert!(AppError::from_status(StatusCode::FORBIDDEN, "").is_authorization_failure());
        assert!(AppError::from_status(StatusCode::NOT_FOUND, "Driver not found").is_not_found());

        let err = AppError::from_status(StatusCode::CONFLICT, "Vehicle busy");
        assert_eq!(err.alert(), "Vehicle busy");
        assert!(!err.is_local_rejection());
    }
}
