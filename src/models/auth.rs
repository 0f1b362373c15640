//! Modelos de autenticación del gateway

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::utils::errors::AppError;

/// Roles que devuelve el servicio de autenticación
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Driver,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Driver => "DRIVER",
        }
    }

}

impl FromStr for UserRole {
    type Err = AppError;

    /// Acepta también el prefijo `ROLE_` de Spring Security
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" | "ROLE_ADMIN" => Ok(UserRole::Admin),
            "DRIVER" | "ROLE_DRIVER" => Ok(UserRole::Driver),
            _ => Err(AppError::Decode(format!("Rol desconocido: {}", s.trim()))),
        }
    }
}

/// Request de login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    /// Los conductores entran con su nombre normalizado (sin espacios, minúsculas)
    pub fn for_driver(name: &str, password: &str) -> Self {
        Self {
            username: normalize_username(name),
            password: password.to_string(),
        }
    }
}

/// Response de login
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub role: Option<UserRole>,
    #[serde(default)]
    pub driver_id: Option<String>,
}

/// Alta o re-sincronización de credenciales de un conductor
///
/// `password_hash` viaja en claro: el servicio de autenticación lo hashea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionDriverRequest {
    pub username: String,
    pub password_hash: String,
    pub driver_id: String,
}

impl ProvisionDriverRequest {
    /// Username = nombre normalizado, password = id del driver
    pub fn for_driver(name: &str, driver_id: &str) -> Self {
        Self {
            username: normalize_username(name),
            password_hash: driver_id.to_string(),
            driver_id: driver_id.to_string(),
        }
    }
}

/// Quitar espacios en blanco y pasar a minúsculas
pub fn normalize_username(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}
